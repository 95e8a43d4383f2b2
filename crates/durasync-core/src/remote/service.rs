//! Retrying, connectivity-aware remote function execution with an offline queue.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use durasync_types::models::BackendReliabilityConfig;
use durasync_types::{
    CallOutcome, CloudFunctionQueueItem, CloudFunctionResult, FlushSummary, FoundationEvent, QueueReason,
};
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connectivity::ConnectivityObserver;
use super::queue_store::QueueStore;
use crate::error::{ensure_not_cancelled, CoreError, CoreResult};
use crate::events::{default_sink, EventSink};
use crate::retry::RetryPolicy;

/// The raw remote call. One invocation is one attempt.
#[async_trait]
pub trait CloudFunctionService: Send + Sync {
    async fn call(&self, function_name: &str, payload_json: &str, cancel: &CancellationToken) -> CloudFunctionResult;
}

/// Executes named remote calls with retry, queueing them while offline or
/// after exhausting retries, and draining the queue in FIFO order once
/// connectivity returns.
pub struct ReliableRemoteCallService {
    inner: Arc<dyn CloudFunctionService>,
    connectivity: Arc<dyn ConnectivityObserver>,
    config: BackendReliabilityConfig,
    policy: RetryPolicy,
    queue_store: Option<Arc<dyn QueueStore>>,
    events: Arc<dyn EventSink>,
    queue: Mutex<VecDeque<CloudFunctionQueueItem>>,
    flush_gate: Mutex<()>,
    initialized: OnceCell<()>,
    shutdown: CancellationToken,
    listener: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ReliableRemoteCallService {
    pub fn new(
        inner: Arc<dyn CloudFunctionService>,
        connectivity: Arc<dyn ConnectivityObserver>,
        config: BackendReliabilityConfig,
    ) -> Self {
        Self {
            inner,
            connectivity,
            policy: RetryPolicy::from_config(&config),
            config,
            queue_store: None,
            events: default_sink(),
            queue: Mutex::new(VecDeque::new()),
            flush_gate: Mutex::new(()),
            initialized: OnceCell::new(),
            shutdown: CancellationToken::new(),
            listener: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_queue_store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.queue_store = Some(store);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn persistent_store(&self) -> Option<&Arc<dyn QueueStore>> {
        if self.config.persistence_enabled() {
            self.queue_store.as_ref()
        } else {
            None
        }
    }

    /// Restore the persisted queue. Runs once; later calls return immediately.
    pub async fn initialize(&self) {
        self.initialized.get_or_init(|| self.restore_queue()).await;
    }

    async fn restore_queue(&self) {
        let Some(store) = self.persistent_store() else {
            return;
        };

        let loaded = match store.load().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to load persisted cloud function queue: {}", e);
                self.events.emit(FoundationEvent::CloudFunctionQueuePersistFailed { error: e.to_string() });
                return;
            }
        };

        let mut restored: Vec<CloudFunctionQueueItem> = loaded.into_iter().filter(|item| item.is_valid()).collect();
        let max = self.config.max_queued_cloud_functions();
        let trimmed = restored.len() > max;
        if trimmed {
            restored.drain(..restored.len() - max);
        }

        let mut queue = self.queue.lock().await;
        if restored.is_empty() {
            if queue.is_empty() {
                if let Err(e) = store.clear().await {
                    self.report_persist_failure(&e);
                }
            }
            return;
        }

        let count = restored.len();
        let had_pending = !queue.is_empty();
        for item in restored.into_iter().rev() {
            queue.push_front(item);
        }
        while queue.len() > max {
            if let Some(evicted) = queue.pop_front() {
                self.emit_evicted(&evicted);
            }
        }

        info!(count, "Restored persisted cloud function queue");
        self.events.emit(FoundationEvent::CloudFunctionQueueRestored { count });

        if trimmed || had_pending {
            self.persist(&queue).await;
        }
    }

    /// Run `function_name` once connectivity and retry policy allow.
    ///
    /// Outcomes: `Completed`, `Failed` (possibly queued for later),
    /// `Deferred` (queued while offline, not attempted) and `Rejected`
    /// (blank function name). Only cancellation is an `Err`.
    pub async fn execute(
        &self,
        function_name: &str,
        payload_json: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<CloudFunctionResult> {
        let function_name = function_name.trim();
        if function_name.is_empty() {
            return Ok(CloudFunctionResult::rejected("Function name is empty"));
        }
        ensure_not_cancelled(cancel)?;
        self.initialize().await;

        if self.config.queue_enabled() && !self.connectivity.is_online() {
            self.enqueue(CloudFunctionQueueItem::new(function_name, payload_json), QueueReason::Offline, cancel)
                .await?;
            return Ok(CloudFunctionResult::deferred("Offline: call queued for deferred execution"));
        }

        let operation = format!("cloud_function:{}", function_name);
        let result = self
            .policy
            .execute_with_hook(
                cancel,
                |token| {
                    let inner = Arc::clone(&self.inner);
                    async move { inner.call(function_name, payload_json, &token).await }
                },
                CloudFunctionResult::success,
                |attempt| {
                    self.events.emit(FoundationEvent::RetryAttempted {
                        operation: operation.clone(),
                        attempt: attempt.attempt,
                        max_attempts: attempt.max_attempts,
                    });
                },
            )
            .await?;

        if result.success() {
            return Ok(result);
        }

        let result = if result.outcome == CallOutcome::Failed {
            result
        } else {
            CloudFunctionResult::failed(result.error.unwrap_or_else(|| "Cloud function failed".to_string()))
        };

        if self.config.queue_enabled() && self.config.queue_failed_cloud_functions {
            self.enqueue(CloudFunctionQueueItem::new(function_name, payload_json), QueueReason::Failure, cancel)
                .await?;
        }
        Ok(result)
    }

    async fn enqueue(
        &self,
        item: CloudFunctionQueueItem,
        reason: QueueReason,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let mut queue = self.queue.lock().await;
        ensure_not_cancelled(cancel)?;

        let max = self.config.max_queued_cloud_functions();
        while queue.len() >= max {
            match queue.pop_front() {
                Some(evicted) => self.emit_evicted(&evicted),
                None => break,
            }
        }

        let function_name = item.function_name.clone();
        queue.push_back(item);
        let queue_size = queue.len();
        self.persist(&queue).await;

        debug!(function_name = %function_name, queue_size, %reason, "Cloud function queued");
        self.events.emit(FoundationEvent::CloudFunctionQueued { function_name, queue_size, reason });
        Ok(())
    }

    /// Drain the queue oldest first, one attempt per item, stopping at the
    /// first failure. A second caller waits for a flush in progress.
    pub async fn flush_queue(&self, cancel: &CancellationToken) -> CoreResult<FlushSummary> {
        let _gate = self.flush_gate.lock().await;
        self.initialize().await;

        if self.queue.lock().await.is_empty() {
            return Ok(FlushSummary::default());
        }

        let mut summary = FlushSummary::default();
        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(item) = self.queue.lock().await.front().cloned() else {
                break;
            };

            summary.attempted += 1;
            let result = self.inner.call(&item.function_name, &item.payload_json, cancel).await;
            if !result.success() {
                debug!(function_name = %item.function_name, "Queued call failed, flush stopped");
                break;
            }

            summary.succeeded += 1;
            let mut queue = self.queue.lock().await;
            if let Some(position) = queue.iter().position(|queued| queued.id == item.id) {
                queue.remove(position);
            }
            self.persist(&queue).await;
        }

        let queue = self.queue.lock().await;
        summary.remaining = queue.len();
        self.persist(&queue).await;
        drop(queue);

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            remaining = summary.remaining,
            "Cloud function queue flushed"
        );
        self.events.emit(FoundationEvent::CloudFunctionQueueFlushed {
            attempted: summary.attempted,
            succeeded: summary.succeeded,
            remaining: summary.remaining,
        });

        if cancelled {
            return Err(CoreError::Cancelled);
        }
        Ok(summary)
    }

    /// Initialize, flush right away if already online, and flush on every
    /// offline→online transition until [`shutdown`](Self::shutdown).
    pub async fn start(self: &Arc<Self>) {
        // Subscribe first so transitions during restore or the startup flush are not missed.
        let mut changes = self.connectivity.subscribe();
        self.initialize().await;

        if self.config.auto_flush_queue_on_reconnect && self.connectivity.is_online() {
            if let Err(e) = self.flush_queue(&self.shutdown).await {
                debug!("Startup flush interrupted: {}", e);
            }
        }

        let service: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    () = shutdown.cancelled() => break,
                    changed = changes.changed() => changed,
                };
                if changed.is_err() {
                    break;
                }

                let online = *changes.borrow_and_update();
                let Some(service) = service.upgrade() else {
                    break;
                };
                if online && service.config.auto_flush_queue_on_reconnect {
                    if let Err(e) = service.flush_queue(&shutdown).await {
                        debug!("Reconnect flush interrupted: {}", e);
                    }
                }
            }
            debug!("Connectivity listener stopped");
        });

        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop background work and write the final queue snapshot.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let queue = self.queue.lock().await;
        self.persist(&queue).await;
    }

    pub async fn queued_items(&self) -> Vec<CloudFunctionQueueItem> {
        self.queue.lock().await.iter().cloned().collect()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Write-through of the whole queue. Failures are reported, never returned.
    async fn persist(&self, queue: &VecDeque<CloudFunctionQueueItem>) {
        let Some(store) = self.persistent_store() else {
            return;
        };

        let result = if queue.is_empty() {
            store.clear().await
        } else {
            let snapshot: Vec<CloudFunctionQueueItem> = queue.iter().cloned().collect();
            store.save(&snapshot).await
        };
        if let Err(e) = result {
            self.report_persist_failure(&e);
        }
    }

    fn report_persist_failure(&self, error: &CoreError) {
        warn!("Failed to persist cloud function queue: {}", error);
        self.events.emit(FoundationEvent::CloudFunctionQueuePersistFailed { error: error.to_string() });
    }

    fn emit_evicted(&self, item: &CloudFunctionQueueItem) {
        warn!(function_name = %item.function_name, "Cloud function queue full, oldest call evicted");
        self.events.emit(FoundationEvent::CloudFunctionEvicted { function_name: item.function_name.clone() });
    }
}

impl Drop for ReliableRemoteCallService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
