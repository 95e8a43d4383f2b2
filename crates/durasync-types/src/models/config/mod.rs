//! Configuration types.

mod backend;
mod save;

pub use backend::{
    BackendConfig, BackendProviderType, BackendReliabilityConfig, CloudSyncConfig,
    ConnectivityConfig,
};
pub use save::{SaveSchemaConfig, SaveSecurityConfig, SaveStorageConfig};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Full configuration document, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct FoundationConfig {
    #[validate(nested)]
    #[serde(default)]
    pub storage: SaveStorageConfig,
    #[validate(nested)]
    #[serde(default)]
    pub security: SaveSecurityConfig,
    #[validate(nested)]
    #[serde(default)]
    pub schema: SaveSchemaConfig,
    #[validate(nested)]
    #[serde(default)]
    pub backend: BackendConfig,
    #[validate(nested)]
    #[serde(default)]
    pub reliability: BackendReliabilityConfig,
    #[validate(nested)]
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
}
