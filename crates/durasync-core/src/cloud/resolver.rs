//! Conflict policies for records present both locally and in the cloud.

use durasync_types::SaveConflictResolution;

/// Decides what happens when local and cloud payloads differ.
///
/// Building a merged payload is entirely up to the resolver; the sync service
/// only writes what it is given.
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, slot: &str, key: &str, local_payload: &str, cloud_payload: &str) -> SaveConflictResolution;
}

/// Local copy wins. This is the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferLocalResolver;

impl ConflictResolver for PreferLocalResolver {
    fn resolve(&self, _slot: &str, _key: &str, _local: &str, _cloud: &str) -> SaveConflictResolution {
        SaveConflictResolution::KeepLocal
    }
}

/// Cloud copy wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferCloudResolver;

impl ConflictResolver for PreferCloudResolver {
    fn resolve(&self, _slot: &str, _key: &str, _local: &str, cloud_payload: &str) -> SaveConflictResolution {
        SaveConflictResolution::UseCloud(cloud_payload.to_string())
    }
}

impl<F> ConflictResolver for F
where
    F: Fn(&str, &str, &str, &str) -> SaveConflictResolution + Send + Sync,
{
    fn resolve(&self, slot: &str, key: &str, local_payload: &str, cloud_payload: &str) -> SaveConflictResolution {
        self(slot, key, local_payload, cloud_payload)
    }
}
