//! Local save configuration: storage location, security policy and schema version.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Rolling backup and payload protection policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Configuration struct - bools are intentional feature flags"
)]
pub struct SaveSecurityConfig {
    /// Encrypt serialized payloads through the configured cipher
    #[serde(default)]
    pub enable_encryption: bool,
    /// Attach a keyed SHA-256 hash and reject payloads that do not match
    #[serde(default = "default_true")]
    pub enable_integrity_hash: bool,
    /// Accept payloads written before the secure envelope existed
    #[serde(default = "default_true")]
    pub allow_legacy_plaintext: bool,
    /// Keep prior payloads as `key.bak.N` before each overwrite
    #[serde(default = "default_true")]
    pub enable_rolling_backups: bool,
    /// Number of backups kept per record. Values below 1 behave as 1
    #[validate(range(max = 64))]
    #[serde(default = "default_max_backup_files")]
    pub max_backup_files: i32,
    /// Walk the backup chain when the primary payload cannot be read
    #[serde(default = "default_true")]
    pub restore_from_backup_on_load_failure: bool,
    /// Key material for the integrity hash and cipher
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

impl SaveSecurityConfig {
    pub fn max_backup_files(&self) -> usize {
        usize::try_from(self.max_backup_files.max(1)).unwrap_or(1)
    }

    pub fn backups_enabled(&self) -> bool {
        self.enable_rolling_backups
    }

    pub fn backup_restore_enabled(&self) -> bool {
        self.enable_rolling_backups && self.restore_from_backup_on_load_failure
    }

    /// Whether the secure serializer should wrap payloads at all.
    pub fn protection_enabled(&self) -> bool {
        self.enable_encryption || self.enable_integrity_hash
    }
}

impl Default for SaveSecurityConfig {
    fn default() -> Self {
        Self {
            enable_encryption: false,
            enable_integrity_hash: true,
            allow_legacy_plaintext: true,
            enable_rolling_backups: true,
            max_backup_files: default_max_backup_files(),
            restore_from_backup_on_load_failure: true,
            secret_key: default_secret_key(),
        }
    }
}

/// Version written into every save envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct SaveSchemaConfig {
    #[serde(default = "default_schema_version")]
    pub current_version: i32,
}

impl SaveSchemaConfig {
    pub fn current_version(&self) -> u32 {
        u32::try_from(self.current_version.max(1)).unwrap_or(1)
    }
}

impl Default for SaveSchemaConfig {
    fn default() -> Self {
        Self { current_version: default_schema_version() }
    }
}

/// Where save files live on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct SaveStorageConfig {
    /// Root directory; `None` means the platform data dir
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Extension of primary payload files
    #[validate(length(min = 1, max = 16))]
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for SaveStorageConfig {
    fn default() -> Self {
        Self { root: None, extension: default_extension() }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_backup_files() -> i32 {
    3
}

fn default_secret_key() -> String {
    "replace-with-project-secret".to_string()
}

fn default_schema_version() -> i32 {
    1
}

fn default_extension() -> String {
    "json".to_string()
}
