//! Backend, reliability and connectivity configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Which backend adapter to build at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendProviderType {
    /// Never configured; every sync fails with `ConfigurationInvalid`.
    #[default]
    None,
    /// Process-local key/value map, always configured and authenticated.
    InMemory,
}

/// Retry and offline-queue behavior for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Configuration struct - bools are intentional feature flags"
)]
pub struct BackendReliabilityConfig {
    #[serde(default = "default_true")]
    pub enable_retry: bool,
    /// Values below 1 behave as 1
    #[validate(range(max = 100))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Linear backoff step; negative values behave as 0
    #[validate(range(max = 600_000))]
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: i64,
    #[serde(default = "default_true")]
    pub enable_cloud_function_queue: bool,
    #[serde(default = "default_true")]
    pub queue_failed_cloud_functions: bool,
    #[serde(default = "default_true")]
    pub auto_flush_queue_on_reconnect: bool,
    #[serde(default = "default_true")]
    pub enable_persistent_cloud_function_queue: bool,
    /// Values below 1 behave as 1
    #[validate(range(max = 10_000))]
    #[serde(default = "default_max_queued")]
    pub max_queued_cloud_functions: i32,
    #[validate(length(min = 1))]
    #[serde(default = "default_queue_storage_key")]
    pub cloud_function_queue_storage_key: String,
}

impl BackendReliabilityConfig {
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.max_attempts.max(1)).unwrap_or(1)
    }

    pub fn initial_delay_ms(&self) -> u64 {
        u64::try_from(self.initial_delay_ms.max(0)).unwrap_or(0)
    }

    pub fn max_queued_cloud_functions(&self) -> usize {
        usize::try_from(self.max_queued_cloud_functions.max(1)).unwrap_or(1)
    }

    pub fn queue_enabled(&self) -> bool {
        self.enable_cloud_function_queue
    }

    pub fn persistence_enabled(&self) -> bool {
        self.enable_cloud_function_queue && self.enable_persistent_cloud_function_queue
    }
}

impl Default for BackendReliabilityConfig {
    fn default() -> Self {
        Self {
            enable_retry: true,
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            enable_cloud_function_queue: true,
            queue_failed_cloud_functions: true,
            auto_flush_queue_on_reconnect: true,
            enable_persistent_cloud_function_queue: true,
            max_queued_cloud_functions: default_max_queued(),
            cloud_function_queue_storage_key: default_queue_storage_key(),
        }
    }
}

/// Backend selection and cloud save key namespacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub provider: BackendProviderType,
    #[validate(nested)]
    #[serde(default)]
    pub sync: CloudSyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct CloudSyncConfig {
    /// Prefix of backend keys: `<namespace>.<slot>.<key>`
    #[validate(length(min = 1, max = 128))]
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CloudSyncConfig {
    fn default() -> Self {
        Self { namespace: default_namespace() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ConnectivityConfig {
    /// How often the reachability probe runs
    #[validate(range(min = 50, max = 3_600_000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self { poll_interval_ms: default_poll_interval_ms() }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> i32 {
    3
}

fn default_initial_delay_ms() -> i64 {
    250
}

fn default_max_queued() -> i32 {
    32
}

fn default_queue_storage_key() -> String {
    "durasync.backend.cloud_function_queue".to_string()
}

fn default_namespace() -> String {
    "foundation.save".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}
