//! Outbound diagnostic events.
//!
//! Services emit these for observability. Nothing in the core waits on or
//! reacts to them, so dropping every event is always safe.

use serde::{Deserialize, Serialize};

use super::cloud_function::QueueReason;
use super::sync::SaveConflictChoice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FoundationEvent {
    RetryAttempted { operation: String, attempt: u32, max_attempts: u32 },

    SaveWritten { slot: String, key: String },
    SaveBackupWritten { slot: String, key: String, index: usize },
    SaveDeleted { slot: String, key: String },
    SaveMigrated { slot: String, key: String, from_version: u32, to_version: u32 },
    SaveCorruptionDetected { slot: String, key: String, error: String },
    SaveRestoredFromBackup { slot: String, key: String, index: usize },
    SaveLoadFailed { slot: String, key: String, error: String },

    CloudSavePushed { slot: String, key: String },
    CloudSavePulled { slot: String, key: String },
    CloudSaveConflictResolved { slot: String, key: String, choice: SaveConflictChoice },
    CloudSaveSyncFailed { slot: String, key: String, error: String },

    CloudFunctionQueued { function_name: String, queue_size: usize, reason: QueueReason },
    CloudFunctionEvicted { function_name: String },
    CloudFunctionQueueRestored { count: usize },
    CloudFunctionQueueFlushed { attempted: usize, succeeded: usize, remaining: usize },
    CloudFunctionQueuePersistFailed { error: String },
}

impl FoundationEvent {
    /// Stable short name, used as the tracing target field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RetryAttempted { .. } => "retry_attempted",
            Self::SaveWritten { .. } => "save_written",
            Self::SaveBackupWritten { .. } => "save_backup_written",
            Self::SaveDeleted { .. } => "save_deleted",
            Self::SaveMigrated { .. } => "save_migrated",
            Self::SaveCorruptionDetected { .. } => "save_corruption_detected",
            Self::SaveRestoredFromBackup { .. } => "save_restored_from_backup",
            Self::SaveLoadFailed { .. } => "save_load_failed",
            Self::CloudSavePushed { .. } => "cloud_save_pushed",
            Self::CloudSavePulled { .. } => "cloud_save_pulled",
            Self::CloudSaveConflictResolved { .. } => "cloud_save_conflict_resolved",
            Self::CloudSaveSyncFailed { .. } => "cloud_save_sync_failed",
            Self::CloudFunctionQueued { .. } => "cloud_function_queued",
            Self::CloudFunctionEvicted { .. } => "cloud_function_evicted",
            Self::CloudFunctionQueueRestored { .. } => "cloud_function_queue_restored",
            Self::CloudFunctionQueueFlushed { .. } => "cloud_function_queue_flushed",
            Self::CloudFunctionQueuePersistFailed { .. } => "cloud_function_queue_persist_failed",
        }
    }

    /// Events that signal lost or at-risk data.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::SaveCorruptionDetected { .. }
                | Self::SaveLoadFailed { .. }
                | Self::CloudSaveSyncFailed { .. }
                | Self::CloudFunctionEvicted { .. }
                | Self::CloudFunctionQueuePersistFailed { .. }
        )
    }
}
