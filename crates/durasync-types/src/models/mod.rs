//! Shared data structures for the save, sync and remote-call services.

mod cloud_function;
mod config;
mod events;
mod record;
mod sync;

pub use cloud_function::{
    CallOutcome, CloudFunctionQueueItem, CloudFunctionResult, FlushSummary, QueueReason,
};
pub use config::{
    BackendConfig, BackendProviderType, BackendReliabilityConfig, CloudSyncConfig,
    ConnectivityConfig, FoundationConfig, SaveSchemaConfig, SaveSecurityConfig,
    SaveStorageConfig,
};
pub use events::FoundationEvent;
pub use record::SaveRecordId;
pub use sync::{CloudSaveSyncAction, CloudSaveSyncResult, SaveConflictChoice, SaveConflictResolution};
