//! Reliable remote function calls.
//!
//! [`ReliableRemoteCallService`] wraps a [`CloudFunctionService`] with retry,
//! an offline FIFO queue mirrored to a [`QueueStore`], and flush-on-reconnect
//! driven by a [`ConnectivityObserver`].

mod connectivity;
mod queue_store;
mod service;

pub use connectivity::{ConnectivityMonitor, ConnectivityObserver, ReachabilityProbe};
pub use queue_store::{FileQueueStore, MemoryQueueStore, QueueStore};
pub use service::{CloudFunctionService, ReliableRemoteCallService};
