//! Retry decorator for backend adapters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use durasync_types::{BackendError, BackendErrorCode, FoundationEvent};
use tokio_util::sync::CancellationToken;

use super::backend::BackendStore;
use crate::events::{default_sink, EventSink};
use crate::retry::RetryPolicy;

/// Wraps a [`BackendStore`] so transient failures are retried.
///
/// Structural failures (auth, configuration, validation) return after the
/// first attempt. Cancellation during backoff surfaces as an `Unknown` error;
/// callers holding the token see it fired and treat the call as cancelled.
pub struct RetryingBackendStore<B> {
    inner: B,
    policy: RetryPolicy,
    events: Arc<dyn EventSink>,
}

impl<B: BackendStore> RetryingBackendStore<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy, events: default_sink() }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn retry_hook(&self, operation: &'static str) -> impl FnMut(crate::retry::RetryAttempt) + '_ {
        move |attempt| {
            self.events.emit(FoundationEvent::RetryAttempted {
                operation: operation.to_string(),
                attempt: attempt.attempt,
                max_attempts: attempt.max_attempts,
            });
        }
    }
}

fn settled<T>(result: &Result<T, BackendError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => !e.code.is_transient(),
    }
}

fn cancelled() -> BackendError {
    BackendError::new(BackendErrorCode::Unknown, "Operation cancelled")
}

#[async_trait]
impl<B: BackendStore> BackendStore for RetryingBackendStore<B> {
    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    async fn get_player_data(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, BackendError> {
        self.policy
            .execute_with_hook(
                cancel,
                |token| async move { self.inner.get_player_data(&token).await },
                settled,
                self.retry_hook("backend.get_player_data"),
            )
            .await
            .unwrap_or_else(|_| Err(cancelled()))
    }

    async fn set_player_data(
        &self,
        data: HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<(), BackendError> {
        let data = &data;
        self.policy
            .execute_with_hook(
                cancel,
                |token| async move { self.inner.set_player_data(data.clone(), &token).await },
                settled,
                self.retry_hook("backend.set_player_data"),
            )
            .await
            .unwrap_or_else(|_| Err(cancelled()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cloud::backend::InMemoryBackendStore;
    use crate::events::RecordingEventSink;

    fn retrying(events: Arc<RecordingEventSink>) -> RetryingBackendStore<InMemoryBackendStore> {
        RetryingBackendStore::new(InMemoryBackendStore::new(), RetryPolicy::new(true, 3, 0))
            .with_events(events)
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let events = Arc::new(RecordingEventSink::default());
        let store = retrying(events.clone());
        store.inner().fail_next_writes(2);

        let data = HashMap::from([("k".to_string(), "v".to_string())]);
        store.set_player_data(data, &CancellationToken::new()).await.unwrap();

        assert_eq!(store.inner().write_count(), 3);
        assert_eq!(store.inner().get("k").as_deref(), Some("v"));
        assert_eq!(events.count("retry_attempted"), 2);
    }

    #[tokio::test]
    async fn test_structural_failure_is_not_retried() {
        let events = Arc::new(RecordingEventSink::default());
        let store = retrying(events.clone());
        store.inner().set_authenticated(false);

        let err = store.get_player_data(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.code, BackendErrorCode::AuthenticationRequired);
        assert_eq!(store.inner().read_count(), 1);
        assert_eq!(events.count("retry_attempted"), 0);
    }
}
