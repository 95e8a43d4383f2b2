//! Reconcile a local save record with its cloud copy.

use std::collections::HashMap;
use std::sync::Arc;

use durasync_types::models::CloudSyncConfig;
use durasync_types::{
    BackendError, BackendErrorCode, CloudSaveSyncAction, CloudSaveSyncResult, FoundationEvent,
    SaveConflictResolution,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::BackendStore;
use super::resolver::{ConflictResolver, PreferLocalResolver};
use crate::error::{ensure_not_cancelled, CoreError, CoreResult};
use crate::events::{default_sink, EventSink};
use crate::save::{deserialize_model, serialize_model, LocalSaveService, SaveSerializer};

/// Push, pull and two-way sync between [`LocalSaveService`] and a [`BackendStore`].
///
/// Cloud payloads are the model serialized by this service's serializer and
/// live under `<namespace>.<slot>.<key>`. Backend trouble comes back as a
/// failed [`CloudSaveSyncResult`]; only blank identifiers, cancellation and
/// local storage errors are `Err`.
pub struct CloudSaveSyncService {
    local: Arc<LocalSaveService>,
    serializer: Arc<dyn SaveSerializer>,
    backend: Arc<dyn BackendStore>,
    resolver: Arc<dyn ConflictResolver>,
    namespace: String,
    events: Arc<dyn EventSink>,
}

impl CloudSaveSyncService {
    pub fn new(
        local: Arc<LocalSaveService>,
        serializer: Arc<dyn SaveSerializer>,
        backend: Arc<dyn BackendStore>,
    ) -> Self {
        Self {
            local,
            serializer,
            backend,
            resolver: Arc::new(PreferLocalResolver),
            namespace: CloudSyncConfig::default().namespace,
            events: default_sink(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_config(mut self, config: &CloudSyncConfig) -> Self {
        self.namespace = config.namespace.trim().trim_end_matches('.').to_string();
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Backend key for a record: `<namespace>.<slot>.<key>`.
    pub fn cloud_key(&self, slot: &str, key: &str) -> String {
        format!("{}.{}.{}", self.namespace, normalize_part(slot), normalize_part(key))
    }

    /// Upload the local record, overwriting the cloud copy.
    pub async fn push<T>(
        &self,
        slot: &str,
        key: &str,
        fallback: T,
        cancel: &CancellationToken,
    ) -> CoreResult<CloudSaveSyncResult>
    where
        T: Serialize + DeserializeOwned,
    {
        validate_ids(slot, key)?;
        ensure_not_cancelled(cancel)?;
        if let Err(e) = self.check_backend() {
            return Ok(self.fail(slot, key, e));
        }

        if !self.local.exists(slot, key).await? {
            let e = BackendError::new(BackendErrorCode::ValidationFailed, "Local save does not exist");
            return Ok(self.fail(slot, key, e));
        }

        let model = self.local.load(slot, key, fallback, cancel).await?;
        let payload = serialize_model(self.serializer.as_ref(), &model)?;
        if let Err(e) = self.push_payload(slot, key, payload, cancel).await? {
            return Ok(self.fail(slot, key, e));
        }

        self.emit_pushed(slot, key);
        Ok(CloudSaveSyncResult::succeeded(CloudSaveSyncAction::PushedLocalToCloud))
    }

    /// Replace the local record with the cloud copy.
    ///
    /// A missing cloud copy is a `NotFound` failure; local state is untouched.
    pub async fn pull<T>(
        &self,
        slot: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<CloudSaveSyncResult>
    where
        T: Serialize + DeserializeOwned,
    {
        validate_ids(slot, key)?;
        ensure_not_cancelled(cancel)?;

        let cloud = match self.fetch_payload(slot, key, cancel).await? {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                let e = BackendError::new(BackendErrorCode::NotFound, "Cloud save does not exist");
                return Ok(self.fail(slot, key, e));
            }
            Err(e) => return Ok(self.fail(slot, key, e)),
        };

        let model: T = match deserialize_model(self.serializer.as_ref(), &cloud) {
            Ok(model) => model,
            Err(reason) => {
                let e = BackendError::new(
                    BackendErrorCode::Unknown,
                    format!("Failed to deserialize cloud save payload: {}", reason),
                );
                return Ok(self.fail(slot, key, e));
            }
        };

        self.local.save(slot, key, &model, cancel).await?;
        self.emit_pulled(slot, key);
        Ok(CloudSaveSyncResult::succeeded(CloudSaveSyncAction::PulledCloudToLocal))
    }

    /// Two-way reconcile.
    ///
    /// | local | cloud | action |
    /// |-------|-------|--------|
    /// | no    | no    | `NoOp` |
    /// | yes   | no    | push |
    /// | no    | yes   | pull |
    /// | yes   | yes   | identical: `NoOp`, otherwise ask the resolver |
    pub async fn sync<T>(
        &self,
        slot: &str,
        key: &str,
        fallback: T,
        cancel: &CancellationToken,
    ) -> CoreResult<CloudSaveSyncResult>
    where
        T: Serialize + DeserializeOwned,
    {
        validate_ids(slot, key)?;
        ensure_not_cancelled(cancel)?;

        let cloud = match self.fetch_payload(slot, key, cancel).await? {
            Ok(cloud) => cloud,
            Err(e) => return Ok(self.fail(slot, key, e)),
        };

        let local = if self.local.exists(slot, key).await? {
            let model = self.local.load(slot, key, fallback, cancel).await?;
            Some(serialize_model(self.serializer.as_ref(), &model)?)
        } else {
            None
        };

        match (local, cloud) {
            (None, None) => {
                debug!(slot, key, "Nothing to sync");
                Ok(CloudSaveSyncResult::succeeded(CloudSaveSyncAction::NoOp))
            }
            (Some(local), None) => {
                if let Err(e) = self.push_payload(slot, key, local, cancel).await? {
                    return Ok(self.fail(slot, key, e));
                }
                self.emit_pushed(slot, key);
                Ok(CloudSaveSyncResult::succeeded(CloudSaveSyncAction::PushedLocalToCloud))
            }
            (None, Some(cloud)) => {
                if let Err(e) = self.apply_to_local::<T>(slot, key, &cloud, BackendErrorCode::Unknown, cancel).await? {
                    return Ok(self.fail(slot, key, e));
                }
                self.emit_pulled(slot, key);
                Ok(CloudSaveSyncResult::succeeded(CloudSaveSyncAction::PulledCloudToLocal))
            }
            (Some(local), Some(cloud)) if local == cloud => {
                debug!(slot, key, "Local and cloud payloads are identical");
                Ok(CloudSaveSyncResult::succeeded(CloudSaveSyncAction::NoOp))
            }
            (Some(local), Some(cloud)) => {
                let resolution = self.resolver.resolve(slot, key, &local, &cloud);
                self.apply_resolution::<T>(slot, key, local, cloud, resolution, cancel).await
            }
        }
    }

    async fn apply_resolution<T>(
        &self,
        slot: &str,
        key: &str,
        local: String,
        cloud: String,
        resolution: SaveConflictResolution,
        cancel: &CancellationToken,
    ) -> CoreResult<CloudSaveSyncResult>
    where
        T: Serialize + DeserializeOwned,
    {
        let choice = resolution.choice();
        let action = match resolution {
            SaveConflictResolution::KeepLocal => {
                if let Err(e) = self.push_payload(slot, key, local, cancel).await? {
                    return Ok(self.fail(slot, key, e));
                }
                CloudSaveSyncAction::ResolvedKeepLocal
            }
            SaveConflictResolution::UseCloud(payload) => {
                let chosen = if payload.trim().is_empty() { cloud } else { payload };
                let applied = self
                    .apply_to_local::<T>(slot, key, &chosen, BackendErrorCode::ValidationFailed, cancel)
                    .await?;
                if let Err(e) = applied {
                    return Ok(self.fail(slot, key, e));
                }
                self.emit_pulled(slot, key);
                CloudSaveSyncAction::ResolvedUseCloud
            }
            SaveConflictResolution::Merge(payload) => {
                if payload.trim().is_empty() {
                    let e =
                        BackendError::new(BackendErrorCode::ValidationFailed, "Merge resolution carries no payload");
                    return Ok(self.fail(slot, key, e));
                }
                let applied = self
                    .apply_to_local::<T>(slot, key, &payload, BackendErrorCode::ValidationFailed, cancel)
                    .await?;
                if let Err(e) = applied {
                    return Ok(self.fail(slot, key, e));
                }
                if let Err(e) = self.push_payload(slot, key, payload, cancel).await? {
                    return Ok(self.fail(slot, key, e));
                }
                CloudSaveSyncAction::ResolvedMerge
            }
        };

        info!(slot, key, choice = choice.as_str(), "Save conflict resolved");
        self.events.emit(FoundationEvent::CloudSaveConflictResolved {
            slot: slot.to_string(),
            key: key.to_string(),
            choice,
        });
        Ok(CloudSaveSyncResult::resolved(action, choice))
    }

    /// Decode `payload` and save it locally. `Ok(Err(_))` means it did not decode.
    async fn apply_to_local<T>(
        &self,
        slot: &str,
        key: &str,
        payload: &str,
        decode_code: BackendErrorCode,
        cancel: &CancellationToken,
    ) -> CoreResult<Result<(), BackendError>>
    where
        T: Serialize + DeserializeOwned,
    {
        let model: T = match deserialize_model(self.serializer.as_ref(), payload) {
            Ok(model) => model,
            Err(reason) => {
                return Ok(Err(BackendError::new(
                    decode_code,
                    format!("Failed to deserialize cloud save payload: {}", reason),
                )))
            }
        };
        self.local.save(slot, key, &model, cancel).await?;
        Ok(Ok(()))
    }

    fn check_backend(&self) -> Result<(), BackendError> {
        if !self.backend.is_configured() {
            return Err(BackendError::new(
                BackendErrorCode::ConfigurationInvalid,
                "Backend service is not configured",
            ));
        }
        if !self.backend.is_authenticated() {
            return Err(BackendError::new(
                BackendErrorCode::AuthenticationRequired,
                "Backend service is not authenticated",
            ));
        }
        Ok(())
    }

    /// `Ok(None)` when the cloud holds no (or a blank) payload for the record.
    async fn fetch_payload(
        &self,
        slot: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<Result<Option<String>, BackendError>> {
        if let Err(e) = self.check_backend() {
            return Ok(Err(e));
        }

        let result = self.backend.get_player_data(cancel).await;
        ensure_not_cancelled(cancel)?;

        Ok(result.map(|mut data| {
            data.remove(&self.cloud_key(slot, key)).filter(|payload| !payload.trim().is_empty())
        }))
    }

    async fn push_payload(
        &self,
        slot: &str,
        key: &str,
        payload: String,
        cancel: &CancellationToken,
    ) -> CoreResult<Result<(), BackendError>> {
        ensure_not_cancelled(cancel)?;
        let update = HashMap::from([(self.cloud_key(slot, key), payload)]);
        let result = self.backend.set_player_data(update, cancel).await;
        ensure_not_cancelled(cancel)?;
        Ok(result)
    }

    fn fail(&self, slot: &str, key: &str, error: BackendError) -> CloudSaveSyncResult {
        warn!(slot, key, code = %error.code, "Cloud save sync failed: {}", error.message);
        self.events.emit(FoundationEvent::CloudSaveSyncFailed {
            slot: slot.to_string(),
            key: key.to_string(),
            error: error.message.clone(),
        });
        CloudSaveSyncResult::failed(error.code, error.message)
    }

    fn emit_pushed(&self, slot: &str, key: &str) {
        debug!(slot, key, "Pushed local save to cloud");
        self.events.emit(FoundationEvent::CloudSavePushed { slot: slot.to_string(), key: key.to_string() });
    }

    fn emit_pulled(&self, slot: &str, key: &str) {
        debug!(slot, key, "Pulled cloud save to local");
        self.events.emit(FoundationEvent::CloudSavePulled { slot: slot.to_string(), key: key.to_string() });
    }
}

fn validate_ids(slot: &str, key: &str) -> CoreResult<()> {
    if slot.trim().is_empty() {
        return Err(CoreError::invalid_argument("Slot is empty"));
    }
    if key.trim().is_empty() {
        return Err(CoreError::invalid_argument("Key is empty"));
    }
    Ok(())
}

fn normalize_part(source: &str) -> String {
    source.trim().replace(' ', "_")
}

impl std::fmt::Debug for CloudSaveSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSaveSyncService").field("namespace", &self.namespace).finish_non_exhaustive()
    }
}
