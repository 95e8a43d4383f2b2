//! Outbound event sinks.
//!
//! Services hand every [`FoundationEvent`] to an [`EventSink`]. Sinks must not
//! block and must not fail; a sink with nobody listening simply drops events.

use std::sync::Arc;

use durasync_types::FoundationEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: FoundationEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: FoundationEvent) {}
}

/// Writes each event to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: FoundationEvent) {
        if event.is_warning() {
            warn!(event = event.name(), details = ?event, "durasync event");
        } else {
            debug!(event = event.name(), details = ?event, "durasync event");
        }
    }
}

/// Fans events out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<FoundationEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FoundationEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: FoundationEvent) {
        // Err only means there are no receivers right now.
        let _ = self.sender.send(event);
    }
}

/// Sends every event to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: FoundationEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

/// Default sink for services constructed without one.
pub fn default_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingEventSink)
}

/// Collects events in memory for assertions.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingEventSink {
    events: parking_lot::Mutex<Vec<FoundationEvent>>,
}

#[cfg(test)]
impl RecordingEventSink {
    pub(crate) fn events(&self) -> Vec<FoundationEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }
}

#[cfg(test)]
impl EventSink for RecordingEventSink {
    fn emit(&self, event: FoundationEvent) {
        self.events.lock().push(event);
    }
}
