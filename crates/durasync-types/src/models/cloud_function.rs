//! Remote function calls: results and the offline queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a call ended from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The remote side executed the function successfully.
    Completed,
    /// Every attempt failed. The call may also have been queued for a later flush.
    Failed,
    /// Accepted into the offline queue without being attempted.
    Deferred,
    /// Refused before any I/O (invalid arguments).
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFunctionResult {
    pub outcome: CallOutcome,
    #[serde(default)]
    pub response_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CloudFunctionResult {
    pub fn completed(response_json: impl Into<String>) -> Self {
        Self { outcome: CallOutcome::Completed, response_json: response_json.into(), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { outcome: CallOutcome::Failed, response_json: String::new(), error: Some(error.into()) }
    }

    pub fn deferred(message: impl Into<String>) -> Self {
        Self {
            outcome: CallOutcome::Deferred,
            response_json: String::new(),
            error: Some(message.into()),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            outcome: CallOutcome::Rejected,
            response_json: String::new(),
            error: Some(error.into()),
        }
    }

    #[inline]
    pub fn success(&self) -> bool {
        self.outcome == CallOutcome::Completed
    }

    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.outcome == CallOutcome::Deferred
    }
}

/// One deferred call waiting in the FIFO queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFunctionQueueItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub function_name: String,
    #[serde(default)]
    pub payload_json: String,
    #[serde(default = "Utc::now")]
    pub enqueued_at: DateTime<Utc>,
}

impl CloudFunctionQueueItem {
    pub fn new(function_name: impl Into<String>, payload_json: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            function_name: function_name.into().trim().to_string(),
            payload_json: payload_json.into(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.function_name.trim().is_empty()
    }
}

/// Why an item entered the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    Offline,
    Failure,
}

impl std::fmt::Display for QueueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Report of one queue drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlushSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub remaining: usize,
}
