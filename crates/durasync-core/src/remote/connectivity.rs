//! Online/offline state and its transition signal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of truth for whether remote calls can be attempted.
pub trait ConnectivityObserver: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes every online/offline transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Answers "can we reach the backend right now?". Used by [`ConnectivityMonitor::spawn_polling`].
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Watch-channel backed [`ConnectivityObserver`].
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    /// Record the current state. Subscribers are woken only on an actual change.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Probe reachability every `interval` until `cancel` fires.
    pub fn spawn_polling(
        self: &Arc<Self>,
        probe: Arc<dyn ReachabilityProbe>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reachable = probe.is_reachable().await;
                        monitor.set_online(reachable);
                    }
                }
            }
            debug!("Connectivity polling stopped");
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityObserver for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlagProbe(AtomicBool);

    #[async_trait]
    impl ReachabilityProbe for FlagProbe {
        async fn is_reachable(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_only_real_transitions_notify() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        assert!(!monitor.set_online(false));
        assert!(!rx.has_changed().unwrap());

        assert!(monitor.set_online(true));
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_follows_probe() {
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let probe = Arc::new(FlagProbe(AtomicBool::new(true)));
        let cancel = CancellationToken::new();
        let mut rx = monitor.subscribe();

        let handle = monitor.spawn_polling(probe.clone(), Duration::from_millis(100), cancel.clone());
        rx.changed().await.unwrap();
        assert!(monitor.is_online());

        probe.0.store(false, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert!(!monitor.is_online());

        cancel.cancel();
        handle.await.unwrap();
    }
}
