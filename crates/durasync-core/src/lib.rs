//! # durasync core
//!
//! Services that keep player data safe across crashes, devices and flaky networks.
//!
//! ```text
//! durasync-core/src/
//! ├── save/      # LocalSaveService: atomic writes, rolling backups, migrations
//! ├── cloud/     # CloudSaveSyncService: push / pull / sync with conflict resolvers
//! ├── remote/    # ReliableRemoteCallService: retry, offline FIFO queue, persistence
//! ├── retry/     # RetryPolicy shared by cloud and remote
//! ├── events.rs  # FoundationEvent sinks (tracing, broadcast, fan-out)
//! ├── config.rs  # FoundationConfig load/save
//! └── logger.rs  # tracing subscriber setup
//! ```
//!
//! Corruption, backend outages and exhausted retries come back as values.
//! [`CoreError`] is reserved for cancellation, caller mistakes and local I/O.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

pub mod cloud;
pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod remote;
pub mod retry;
pub mod save;

pub use cloud::{BackendStore, CloudSaveSyncService, ConflictResolver};
pub use error::{CoreError, CoreResult};
pub use events::{EventSink, TracingEventSink};
pub use remote::{CloudFunctionService, ConnectivityMonitor, ReliableRemoteCallService};
pub use retry::RetryPolicy;
pub use save::{LocalSaveService, SaveStore};

pub use durasync_types;
