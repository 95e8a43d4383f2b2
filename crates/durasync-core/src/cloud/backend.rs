//! Backend key/value adapters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use durasync_types::models::{BackendConfig, BackendProviderType};
use durasync_types::{BackendError, BackendErrorCode};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Player data storage offered by a remote backend.
///
/// `set_player_data` merges the given entries into the stored map; keys not
/// present in `data` are left alone.
#[async_trait]
pub trait BackendStore: Send + Sync {
    fn is_configured(&self) -> bool;
    fn is_authenticated(&self) -> bool;

    async fn get_player_data(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, BackendError>;

    async fn set_player_data(
        &self,
        data: HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<(), BackendError>;
}

fn not_configured() -> BackendError {
    BackendError::new(BackendErrorCode::ConfigurationInvalid, "Backend service is not configured")
}

fn not_authenticated() -> BackendError {
    BackendError::new(BackendErrorCode::AuthenticationRequired, "Backend service is not authenticated")
}

/// Placeholder used when no provider is selected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackendStore;

#[async_trait]
impl BackendStore for NullBackendStore {
    fn is_configured(&self) -> bool {
        false
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    async fn get_player_data(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, BackendError> {
        Err(not_configured())
    }

    async fn set_player_data(
        &self,
        _data: HashMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<(), BackendError> {
        Err(not_configured())
    }
}

/// Process-local backend.
///
/// Starts configured and authenticated. The failure knobs make the next N
/// reads or writes fail with `Network`, which is how tests exercise retry.
#[derive(Debug)]
pub struct InMemoryBackendStore {
    data: RwLock<HashMap<String, String>>,
    configured: AtomicBool,
    authenticated: AtomicBool,
    failing_reads: AtomicU32,
    failing_writes: AtomicU32,
    reads: AtomicU32,
    writes: AtomicU32,
}

impl Default for InMemoryBackendStore {
    fn default() -> Self {
        Self::with_state(true, true)
    }
}

impl InMemoryBackendStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(configured: bool, authenticated: bool) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            configured: AtomicBool::new(configured),
            authenticated: AtomicBool::new(authenticated),
            failing_reads: AtomicU32::new(0),
            failing_writes: AtomicU32::new(0),
            reads: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.read().clone()
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Reads attempted so far, including failed ones.
    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_ready(&self) -> Result<(), BackendError> {
        if !self.is_configured() {
            return Err(not_configured());
        }
        if !self.is_authenticated() {
            return Err(not_authenticated());
        }
        Ok(())
    }

    /// Decrement `counter` if positive; true means this call should fail.
    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BackendStore for InMemoryBackendStore {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn get_player_data(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, BackendError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_ready()?;
        if Self::take_failure(&self.failing_reads) {
            return Err(BackendError::network("Simulated read failure"));
        }
        Ok(self.snapshot())
    }

    async fn set_player_data(
        &self,
        data: HashMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<(), BackendError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_ready()?;
        if Self::take_failure(&self.failing_writes) {
            return Err(BackendError::network("Simulated write failure"));
        }
        self.data.write().extend(data);
        Ok(())
    }
}

/// Closed set of built-in adapters, picked once from [`BackendConfig`].
#[derive(Debug)]
pub enum BackendProvider {
    Null(NullBackendStore),
    InMemory(InMemoryBackendStore),
}

impl BackendProvider {
    pub fn from_config(config: &BackendConfig) -> Self {
        match config.provider {
            BackendProviderType::None => Self::Null(NullBackendStore),
            BackendProviderType::InMemory => Self::InMemory(InMemoryBackendStore::new()),
        }
    }

    pub fn provider_type(&self) -> BackendProviderType {
        match self {
            Self::Null(_) => BackendProviderType::None,
            Self::InMemory(_) => BackendProviderType::InMemory,
        }
    }
}

#[async_trait]
impl BackendStore for BackendProvider {
    fn is_configured(&self) -> bool {
        match self {
            Self::Null(store) => store.is_configured(),
            Self::InMemory(store) => store.is_configured(),
        }
    }

    fn is_authenticated(&self) -> bool {
        match self {
            Self::Null(store) => store.is_authenticated(),
            Self::InMemory(store) => store.is_authenticated(),
        }
    }

    async fn get_player_data(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, BackendError> {
        match self {
            Self::Null(store) => store.get_player_data(cancel).await,
            Self::InMemory(store) => store.get_player_data(cancel).await,
        }
    }

    async fn set_player_data(
        &self,
        data: HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<(), BackendError> {
        match self {
            Self::Null(store) => store.set_player_data(data, cancel).await,
            Self::InMemory(store) => store.set_player_data(data, cancel).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_selection() {
        let none = BackendProvider::from_config(&BackendConfig::default());
        assert_eq!(none.provider_type(), BackendProviderType::None);
        assert!(!none.is_configured());

        let err = none.get_player_data(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, BackendErrorCode::ConfigurationInvalid);

        let config = BackendConfig { provider: BackendProviderType::InMemory, ..Default::default() };
        let memory = BackendProvider::from_config(&config);
        assert!(memory.is_configured() && memory.is_authenticated());
    }

    #[tokio::test]
    async fn test_in_memory_merge_and_failure_injection() {
        let store = InMemoryBackendStore::new();
        let cancel = CancellationToken::new();
        store.insert("a", "1");

        store.fail_next_writes(1);
        let first = store.set_player_data(HashMap::from([("b".to_string(), "2".to_string())]), &cancel).await;
        assert_eq!(first.unwrap_err().code, BackendErrorCode::Network);

        store.set_player_data(HashMap::from([("b".to_string(), "2".to_string())]), &cancel).await.unwrap();
        let data = store.get_player_data(&cancel).await.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_store_rejects_io() {
        let store = InMemoryBackendStore::with_state(true, false);
        let err = store.get_player_data(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, BackendErrorCode::AuthenticationRequired);
    }
}
