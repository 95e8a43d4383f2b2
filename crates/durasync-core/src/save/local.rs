//! Durable local saves with rolling backups and corruption recovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use durasync_types::models::{SaveSchemaConfig, SaveSecurityConfig};
use durasync_types::{FoundationConfig, FoundationEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::migration::{extract_payload, wrap_payload, SaveMigrationService};
use super::paths::SavePaths;
use super::serializer::{from_value, to_value, SaveSerializer};
use super::store::SaveStore;
use crate::error::{ensure_not_cancelled, CoreResult};
use crate::events::{default_sink, EventSink};

/// A payload that decoded, plus the rewritten envelope when it had to be migrated.
struct Decoded<T> {
    model: T,
    upgraded: Option<(u32, String)>,
}

/// Holds a record's lock; on release the map entry is dropped unless someone is waiting on it.
struct RecordGuard<'a> {
    locks: &'a DashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>,
    path: PathBuf,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.remove_if(&self.path, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct LocalSaveService {
    store: Arc<dyn SaveStore>,
    serializer: Arc<dyn SaveSerializer>,
    paths: SavePaths,
    security: SaveSecurityConfig,
    schema_version: u32,
    migrations: Option<Arc<SaveMigrationService>>,
    events: Arc<dyn EventSink>,
    /// Serializes rotation + primary write per record.
    record_locks: DashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>,
}

impl LocalSaveService {
    pub fn new(store: Arc<dyn SaveStore>, serializer: Arc<dyn SaveSerializer>, paths: SavePaths) -> Self {
        Self {
            store,
            serializer,
            paths,
            security: SaveSecurityConfig::default(),
            schema_version: SaveSchemaConfig::default().current_version(),
            migrations: None,
            events: default_sink(),
            record_locks: DashMap::new(),
        }
    }

    /// Build from the storage, security and schema sections of `config`.
    pub fn from_config(
        store: Arc<dyn SaveStore>,
        serializer: Arc<dyn SaveSerializer>,
        config: &FoundationConfig,
    ) -> CoreResult<Self> {
        let paths = SavePaths::from_config(&config.storage)?;
        Ok(Self::new(store, serializer, paths)
            .with_security(config.security.clone())
            .with_schema(config.schema))
    }

    pub fn with_security(mut self, security: SaveSecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_schema(mut self, schema: SaveSchemaConfig) -> Self {
        self.schema_version = schema.current_version();
        self
    }

    pub fn with_migrations(mut self, migrations: SaveMigrationService) -> Self {
        self.migrations = Some(Arc::new(migrations));
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn paths(&self) -> &SavePaths {
        &self.paths
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    async fn lock_record(&self, primary: &Path) -> RecordGuard<'_> {
        let lock = self
            .record_locks
            .entry(primary.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        RecordGuard { locks: &self.record_locks, path: primary.to_path_buf(), guard: Some(lock.lock_owned().await) }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.record_locks.len()
    }

    /// Serialize `model` and make it the record's primary payload.
    ///
    /// The previous primary is rotated into `key.bak.0` first. Cancellation is
    /// honored until rotation begins; after that the save runs to completion.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        slot: &str,
        key: &str,
        model: &T,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let primary = self.paths.primary(slot, key)?;
        ensure_not_cancelled(cancel)?;

        let payload = self.serializer.serialize(&to_value(model)?)?;
        let wrapped = wrap_payload(&payload, self.schema_version);

        let _guard = self.lock_record(&primary).await;
        ensure_not_cancelled(cancel)?;

        if self.security.backups_enabled() && self.store.exists(&primary).await? {
            self.rotate_backups(slot, key, &primary).await?;
        }

        self.store.write_text(&primary, &wrapped).await?;
        debug!(slot, key, path = %primary.display(), "Save written");
        self.events.emit(FoundationEvent::SaveWritten { slot: slot.to_string(), key: key.to_string() });
        Ok(())
    }

    /// Shift `bak.i` to `bak.i+1`, dropping the oldest, then copy the primary into `bak.0`.
    async fn rotate_backups(&self, slot: &str, key: &str, primary: &Path) -> CoreResult<()> {
        let max_backups = self.security.max_backup_files();

        for index in (0..max_backups.saturating_sub(1)).rev() {
            let src = self.paths.backup(slot, key, index)?;
            let dst = self.paths.backup(slot, key, index + 1)?;
            match self.store.read_text(&src).await? {
                Some(text) => self.store.write_text(&dst, &text).await?,
                None => self.store.delete(&dst).await?,
            }
        }

        let current = self.store.read_text(primary).await?;
        if let Some(current) = current.filter(|text| !text.is_empty()) {
            let newest = self.paths.backup(slot, key, 0)?;
            self.store.write_text(&newest, &current).await?;
            self.events.emit(FoundationEvent::SaveBackupWritten {
                slot: slot.to_string(),
                key: key.to_string(),
                index: 0,
            });
        }
        Ok(())
    }

    /// Load the record, or `fallback` when it is missing or unrecoverable.
    ///
    /// A corrupted primary is replaced by the newest backup that still decodes.
    pub async fn load<T: DeserializeOwned>(
        &self,
        slot: &str,
        key: &str,
        fallback: T,
        cancel: &CancellationToken,
    ) -> CoreResult<T> {
        let primary = self.paths.primary(slot, key)?;
        ensure_not_cancelled(cancel)?;

        let _guard = self.lock_record(&primary).await;

        let Some(raw) = self.store.read_text(&primary).await? else {
            return Ok(fallback);
        };

        let mut error = match self.decode::<T>(slot, key, &raw) {
            Ok(decoded) => {
                if let Some((from_version, envelope)) = decoded.upgraded {
                    ensure_not_cancelled(cancel)?;
                    self.store.write_text(&primary, &envelope).await?;
                    self.emit_migrated(slot, key, from_version);
                }
                return Ok(decoded.model);
            }
            Err(error) => error,
        };

        warn!(slot, key, error = %error, "Save payload is corrupted");
        self.events.emit(FoundationEvent::SaveCorruptionDetected {
            slot: slot.to_string(),
            key: key.to_string(),
            error: error.clone(),
        });

        if self.security.backup_restore_enabled() {
            for index in 0..self.security.max_backup_files() {
                let backup = self.paths.backup(slot, key, index)?;
                let Some(raw) = self.store.read_text(&backup).await? else {
                    continue;
                };
                if raw.trim().is_empty() {
                    continue;
                }

                match self.decode::<T>(slot, key, &raw) {
                    Ok(decoded) => {
                        ensure_not_cancelled(cancel)?;
                        let promoted = decoded.upgraded.as_ref().map_or(raw.as_str(), |(_, text)| text.as_str());
                        self.store.write_text(&primary, promoted).await?;

                        info!(slot, key, index, "Restored save from backup");
                        self.events.emit(FoundationEvent::SaveRestoredFromBackup {
                            slot: slot.to_string(),
                            key: key.to_string(),
                            index,
                        });
                        if let Some((from_version, _)) = decoded.upgraded {
                            self.emit_migrated(slot, key, from_version);
                        }
                        return Ok(decoded.model);
                    }
                    Err(backup_error) => {
                        debug!(slot, key, index, error = %backup_error, "Backup is not usable");
                        error = backup_error;
                    }
                }
            }
        }

        warn!(slot, key, error = %error, "Falling back to default model");
        self.events.emit(FoundationEvent::SaveLoadFailed {
            slot: slot.to_string(),
            key: key.to_string(),
            error,
        });
        Ok(fallback)
    }

    fn decode<T: DeserializeOwned>(&self, slot: &str, key: &str, raw: &str) -> Result<Decoded<T>, String> {
        if raw.trim().is_empty() {
            return Err("Save payload is empty".to_string());
        }

        let (mut payload, version) = extract_payload(raw);
        if version > self.schema_version {
            return Err(format!("Unsupported save version: {} > {}", version, self.schema_version));
        }

        let mut upgraded_from = None;
        if version < self.schema_version {
            let migrations = self
                .migrations
                .as_ref()
                .ok_or_else(|| "Save migration service is not configured".to_string())?;
            let (_, migrated) = migrations.migrate(slot, key, version, self.schema_version, &payload)?;
            payload = migrated;
            upgraded_from = Some(version);
        }

        let model = from_value(self.serializer.try_deserialize(&payload)?)?;
        Ok(Decoded {
            model,
            upgraded: upgraded_from.map(|from| (from, wrap_payload(&payload, self.schema_version))),
        })
    }

    fn emit_migrated(&self, slot: &str, key: &str, from_version: u32) {
        info!(slot, key, from_version, to_version = self.schema_version, "Save migrated");
        self.events.emit(FoundationEvent::SaveMigrated {
            slot: slot.to_string(),
            key: key.to_string(),
            from_version,
            to_version: self.schema_version,
        });
    }

    pub async fn exists(&self, slot: &str, key: &str) -> CoreResult<bool> {
        let primary = self.paths.primary(slot, key)?;
        self.store.exists(&primary).await
    }

    /// Remove the primary payload and every backup of the record.
    pub async fn delete(&self, slot: &str, key: &str, cancel: &CancellationToken) -> CoreResult<()> {
        let primary = self.paths.primary(slot, key)?;
        ensure_not_cancelled(cancel)?;

        let _guard = self.lock_record(&primary).await;
        ensure_not_cancelled(cancel)?;

        self.store.delete(&primary).await?;
        for index in 0..self.security.max_backup_files() {
            self.store.delete(&self.paths.backup(slot, key, index)?).await?;
        }

        debug!(slot, key, "Save deleted");
        self.events.emit(FoundationEvent::SaveDeleted { slot: slot.to_string(), key: key.to_string() });
        Ok(())
    }

    /// Backup files currently present for the record as `(index, path)`, newest first.
    pub async fn backup_paths(&self, slot: &str, key: &str) -> CoreResult<Vec<(usize, PathBuf)>> {
        let mut present = Vec::new();
        for index in 0..self.security.max_backup_files() {
            let path = self.paths.backup(slot, key, index)?;
            if self.store.exists(&path).await? {
                present.push((index, path));
            }
        }
        Ok(present)
    }
}
