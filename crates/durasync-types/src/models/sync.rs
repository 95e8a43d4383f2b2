//! Cloud save conflict resolution and sync outcomes.

use serde::{Deserialize, Serialize};

use crate::error::BackendErrorCode;

/// Which side a resolver picked when both local and cloud copies exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveConflictChoice {
    KeepLocal,
    UseCloud,
    Merge,
}

impl SaveConflictChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepLocal => "keep_local",
            Self::UseCloud => "use_cloud",
            Self::Merge => "merge",
        }
    }
}

/// Resolver verdict, consumed once per sync call.
///
/// `UseCloud` with an empty payload means "the cloud payload as read".
/// `Merge` must carry the merged payload; building it is the resolver's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", content = "payload", rename_all = "snake_case")]
pub enum SaveConflictResolution {
    KeepLocal,
    UseCloud(String),
    Merge(String),
}

impl SaveConflictResolution {
    pub fn choice(&self) -> SaveConflictChoice {
        match self {
            Self::KeepLocal => SaveConflictChoice::KeepLocal,
            Self::UseCloud(_) => SaveConflictChoice::UseCloud,
            Self::Merge(_) => SaveConflictChoice::Merge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CloudSaveSyncAction {
    #[default]
    NoOp,
    PushedLocalToCloud,
    PulledCloudToLocal,
    ResolvedKeepLocal,
    ResolvedUseCloud,
    ResolvedMerge,
}

/// Result of a push, pull or sync call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSaveSyncResult {
    pub success: bool,
    pub action: CloudSaveSyncAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_choice: Option<SaveConflictChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_error_code: Option<BackendErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CloudSaveSyncResult {
    pub fn succeeded(action: CloudSaveSyncAction) -> Self {
        Self { success: true, action, conflict_choice: None, backend_error_code: None, error: None }
    }

    pub fn resolved(action: CloudSaveSyncAction, choice: SaveConflictChoice) -> Self {
        Self { conflict_choice: Some(choice), ..Self::succeeded(action) }
    }

    pub fn failed(code: BackendErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action: CloudSaveSyncAction::NoOp,
            conflict_choice: None,
            backend_error_code: Some(code),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_choice() {
        assert_eq!(SaveConflictResolution::KeepLocal.choice(), SaveConflictChoice::KeepLocal);
        assert_eq!(
            SaveConflictResolution::Merge("{}".to_string()).choice(),
            SaveConflictChoice::Merge
        );
    }

    #[test]
    fn test_failed_result_shape() {
        let result =
            CloudSaveSyncResult::failed(BackendErrorCode::AuthenticationRequired, "not signed in");
        assert!(!result.success);
        assert_eq!(result.action, CloudSaveSyncAction::NoOp);
        assert_eq!(result.backend_error_code, Some(BackendErrorCode::AuthenticationRequired));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["backend_error_code"], "authentication_required");
        assert!(json.get("conflict_choice").is_none());
    }
}
