//! Typed error definitions shared across durasync crates.
//!
//! - [`ConfigError`] covers configuration load/validate/write failures.
//! - [`BackendError`] is what a backend adapter reports; it carries a
//!   [`BackendErrorCode`] so callers can match on the failure class.

mod config;

pub use config::ConfigError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of backend failures surfaced in sync results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorCode {
    #[default]
    None,
    Unknown,
    ConfigurationInvalid,
    AuthenticationRequired,
    ProviderUnavailable,
    ValidationFailed,
    NotFound,
    Network,
}

impl BackendErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Unknown => "unknown",
            Self::ConfigurationInvalid => "configuration_invalid",
            Self::AuthenticationRequired => "authentication_required",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ValidationFailed => "validation_failed",
            Self::NotFound => "not_found",
            Self::Network => "network",
        }
    }

    /// Transient classes are worth another attempt; everything else is structural.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::ProviderUnavailable | Self::Unknown)
    }
}

impl std::fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by a backend adapter.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: BackendErrorCode,
    pub message: String,
}

impl BackendError {
    pub fn new(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::ProviderUnavailable, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::Network, message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_serialization() {
        let err = ConfigError::ValidationError {
            field: "max_attempts".to_string(),
            message: "out of range".to_string(),
        };

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("ValidationError"));
        assert!(json.contains("max_attempts"));

        let deserialized: ConfigError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new(BackendErrorCode::AuthenticationRequired, "login first");
        assert_eq!(err.to_string(), "authentication_required: login first");
    }

    #[test]
    fn test_transient_codes() {
        assert!(BackendErrorCode::Network.is_transient());
        assert!(BackendErrorCode::ProviderUnavailable.is_transient());
        assert!(!BackendErrorCode::AuthenticationRequired.is_transient());
        assert!(!BackendErrorCode::ValidationFailed.is_transient());
    }
}
