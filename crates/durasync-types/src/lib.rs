//! # durasync types
//!
//! Plain data shared by the durasync crates:
//!
//! - **`error`** - configuration and backend error types
//! - **`models`** - record ids, sync results, queue items, events, configuration
//!
//! ```text
//!        durasync-types (this crate)
//!                │
//!                ▼
//!          durasync-core
//!                │
//!                ▼
//!          durasync-cli
//! ```

pub mod error;
pub mod models;

pub use error::{BackendError, BackendErrorCode, ConfigError};
pub use models::{
    CallOutcome, CloudFunctionQueueItem, CloudFunctionResult, CloudSaveSyncAction,
    CloudSaveSyncResult, FlushSummary, FoundationConfig, FoundationEvent, QueueReason,
    SaveConflictChoice, SaveConflictResolution, SaveRecordId,
};
