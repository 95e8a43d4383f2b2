//! Byte-level persistence contract used by the local save service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::CoreResult;

/// Text key/value persistence addressed by path.
///
/// Reading or deleting a path that does not exist is not an error.
#[async_trait]
pub trait SaveStore: Send + Sync {
    async fn exists(&self, path: &Path) -> CoreResult<bool>;
    async fn read_text(&self, path: &Path) -> CoreResult<Option<String>>;
    async fn write_text(&self, path: &Path, text: &str) -> CoreResult<()>;
    async fn delete(&self, path: &Path) -> CoreResult<()>;
}

/// Process-local store. Useful for hosts without a writable filesystem.
#[derive(Debug, Default)]
pub struct MemorySaveStore {
    files: RwLock<HashMap<PathBuf, String>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Overwrite a path directly, bypassing the service layer.
    pub fn put_raw(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.write().insert(path.into(), text.into());
    }

    pub fn get_raw(&self, path: &Path) -> Option<String> {
        self.files.read().get(path).cloned()
    }
}

#[async_trait]
impl SaveStore for MemorySaveStore {
    async fn exists(&self, path: &Path) -> CoreResult<bool> {
        Ok(self.files.read().contains_key(path))
    }

    async fn read_text(&self, path: &Path) -> CoreResult<Option<String>> {
        Ok(self.files.read().get(path).cloned())
    }

    async fn write_text(&self, path: &Path, text: &str) -> CoreResult<()> {
        self.files.write().insert(path.to_path_buf(), text.to_string());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> CoreResult<()> {
        self.files.write().remove(path);
        Ok(())
    }
}
