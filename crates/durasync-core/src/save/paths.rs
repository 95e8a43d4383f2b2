//! Deterministic file layout for save records.
//!
//! ```text
//! root/<slot>/<key>.<ext>       primary payload
//! root/<slot>/<key>.bak.<n>     backup n, 0 = newest
//! ```

use std::path::{Path, PathBuf};

use durasync_types::models::SaveStorageConfig;

use crate::error::{CoreError, CoreResult};

/// Overrides the platform data directory (container deployments, tests).
pub const DATA_DIR_ENV: &str = "DURASYNC_DATA_DIR";
const APP_DIR: &str = "durasync";
const SAVES_DIR: &str = "saves";

const INVALID_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePaths {
    root: PathBuf,
    extension: String,
}

impl SavePaths {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = extension.trim().trim_start_matches('.').to_string();
        Self {
            root: root.into(),
            extension: if extension.is_empty() { "json".to_string() } else { extension },
        }
    }

    /// Explicit root from config, otherwise [`default_root`].
    pub fn from_config(config: &SaveStorageConfig) -> CoreResult<Self> {
        let root = match &config.root {
            Some(root) => root.clone(),
            None => default_root()?,
        };
        Ok(Self::new(root, config.extension.as_str()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn primary(&self, slot: &str, key: &str) -> CoreResult<PathBuf> {
        let (slot, key) = validated(slot, key)?;
        Ok(self.root.join(slot).join(format!("{}.{}", key, self.extension)))
    }

    pub fn backup(&self, slot: &str, key: &str, index: usize) -> CoreResult<PathBuf> {
        let (slot, key) = validated(slot, key)?;
        Ok(self.root.join(slot).join(format!("{}.bak.{}", key, index)))
    }
}

/// Resolve the durasync data directory.
///
/// Priority:
/// 1. `DURASYNC_DATA_DIR` environment variable
/// 2. `<platform data dir>/durasync`
pub fn data_dir() -> CoreResult<PathBuf> {
    if let Ok(custom_dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(custom_dir));
    }
    Ok(dirs::data_dir()
        .ok_or_else(|| CoreError::Storage("Cannot resolve platform data directory".to_string()))?
        .join(APP_DIR))
}

/// `<data dir>/saves`
pub fn default_root() -> CoreResult<PathBuf> {
    Ok(data_dir()?.join(SAVES_DIR))
}

/// Reject blank identifiers and make the rest safe to use as a file name.
fn validated(slot: &str, key: &str) -> CoreResult<(String, String)> {
    if slot.trim().is_empty() {
        return Err(CoreError::invalid_argument("Slot is empty"));
    }
    if key.trim().is_empty() {
        return Err(CoreError::invalid_argument("Key is empty"));
    }
    Ok((safe_name(slot), safe_name(key)))
}

pub(crate) fn safe_name(source: &str) -> String {
    let cleaned: String = source
        .trim()
        .chars()
        .map(|c| if INVALID_NAME_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    // "." and ".." would escape the slot directory
    if cleaned.chars().all(|c| c == '.') {
        return "_".repeat(cleaned.len());
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = SavePaths::new("/data/saves", "json");

        assert_eq!(
            paths.primary("global", "profile").ok(),
            Some(PathBuf::from("/data/saves/global/profile.json"))
        );
        assert_eq!(
            paths.backup("global", "profile", 0).ok(),
            Some(PathBuf::from("/data/saves/global/profile.bak.0"))
        );
    }

    #[test]
    fn test_unsafe_names_are_sanitized() {
        assert_eq!(safe_name(" a/b:c "), "a_b_c");
        assert_eq!(safe_name(".."), "__");
        assert_eq!(safe_name("tab\there"), "tab_here");
        assert_eq!(safe_name("v1.2"), "v1.2");
    }

    #[test]
    fn test_explicit_root_from_config() {
        let config = SaveStorageConfig { root: Some(PathBuf::from("/srv/game")), extension: "sav".into() };
        let paths = SavePaths::from_config(&config).ok();
        assert_eq!(
            paths.and_then(|p| p.primary("s", "k").ok()),
            Some(PathBuf::from("/srv/game/s/k.sav"))
        );
    }

    #[test]
    fn test_blank_identifiers_rejected() {
        let paths = SavePaths::new("/tmp", ".dat");
        assert_eq!(paths.extension(), "dat");
        assert!(matches!(paths.primary(" ", "k"), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(paths.backup("s", "", 0), Err(CoreError::InvalidArgument(_))));
    }
}
