//! Crash-surviving storage for the cloud-function queue.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use durasync_types::models::BackendReliabilityConfig;
use durasync_types::CloudFunctionQueueItem;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::save::{atomic_write_text, read_lossy};

/// Snapshot persistence for queued calls. Items are stored oldest first.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> CoreResult<Vec<CloudFunctionQueueItem>>;
    async fn save(&self, items: &[CloudFunctionQueueItem]) -> CoreResult<()>;
    async fn clear(&self) -> CoreResult<()>;
}

/// In-process store that counts calls.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    items: Mutex<Vec<CloudFunctionQueueItem>>,
    loads: AtomicU32,
    saves: AtomicU32,
    clears: AtomicU32,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CloudFunctionQueueItem>) -> Self {
        Self { items: Mutex::new(items), ..Self::default() }
    }

    pub fn items(&self) -> Vec<CloudFunctionQueueItem> {
        self.items.lock().clone()
    }

    pub fn load_count(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> u32 {
        self.clears.load(Ordering::SeqCst)
    }

    /// Make every following `load` fail with a storage error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every following `save` fail with a storage error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> CoreResult<Vec<CloudFunctionQueueItem>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("Simulated queue load failure".to_string()));
        }
        Ok(self.items.lock().clone())
    }

    async fn save(&self, items: &[CloudFunctionQueueItem]) -> CoreResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("Simulated queue save failure".to_string()));
        }
        *self.items.lock() = items.to_vec();
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.items.lock().clear();
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueDocument {
    #[serde(default)]
    items: Vec<CloudFunctionQueueItem>,
}

/// JSON document `{ "items": [...] }` at a fixed path.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<cloud_function_queue_storage_key>.json`
    pub fn from_config(dir: &Path, config: &BackendReliabilityConfig) -> Self {
        Self::new(dir.join(format!("{}.json", config.cloud_function_queue_storage_key.trim())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self) -> CoreResult<Vec<CloudFunctionQueueItem>> {
        let Some(text) = read_lossy(&self.path).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<QueueDocument>(&text) {
            Ok(document) => Ok(document.items.into_iter().filter(|item| item.is_valid()).collect()),
            Err(e) => {
                warn!(path = %self.path.display(), "Unreadable queue document, starting empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, items: &[CloudFunctionQueueItem]) -> CoreResult<()> {
        let items: Vec<CloudFunctionQueueItem> = items.iter().filter(|item| item.is_valid()).cloned().collect();
        if items.is_empty() {
            return self.clear().await;
        }

        let text = serde_json::to_string_pretty(&QueueDocument { items })?;
        atomic_write_text(&self.path, &text).await?;
        debug!(path = %self.path.display(), "Queue snapshot saved");
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
