#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use durasync_types::models::{SaveSchemaConfig, SaveSecurityConfig};
use durasync_types::FoundationEvent;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::migration::extract_payload;
use super::*;
use crate::error::CoreError;
use crate::events::RecordingEventSink;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Progress {
    v: i32,
}

const MISSING: Progress = Progress { v: -1 };

struct Harness {
    store: Arc<MemorySaveStore>,
    events: Arc<RecordingEventSink>,
    service: LocalSaveService,
}

fn harness(security: SaveSecurityConfig) -> Harness {
    let store = Arc::new(MemorySaveStore::new());
    let events = Arc::new(RecordingEventSink::default());
    let service = LocalSaveService::new(
        store.clone(),
        Arc::new(JsonSaveSerializer::new()),
        SavePaths::new("/saves", "json"),
    )
    .with_security(security)
    .with_events(events.clone());
    Harness { store, events, service }
}

fn decode_stored(store: &MemorySaveStore, path: &Path) -> Progress {
    let raw = store.get_raw(path).unwrap();
    let (payload, _) = extract_payload(&raw);
    serde_json::from_str(&payload).unwrap()
}

#[tokio::test]
async fn test_round_trip() {
    let h = harness(SaveSecurityConfig::default());
    let cancel = CancellationToken::new();

    h.service.save("global", "profile", &Progress { v: 5 }, &cancel).await.unwrap();
    let loaded = h.service.load("global", "profile", MISSING, &cancel).await.unwrap();

    assert_eq!(loaded, Progress { v: 5 });
    assert!(h.service.exists("global", "profile").await.unwrap());
    assert_eq!(h.events.count("save_written"), 1);
}

#[tokio::test]
async fn test_missing_record_returns_fallback_quietly() {
    let h = harness(SaveSecurityConfig::default());
    let loaded = h.service.load("global", "nope", MISSING, &CancellationToken::new()).await.unwrap();

    assert_eq!(loaded, MISSING);
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn test_corrupted_primary_restores_newest_backup_durably() {
    let h = harness(SaveSecurityConfig::default());
    let cancel = CancellationToken::new();
    for v in 1..=3 {
        h.service.save("global", "profile", &Progress { v }, &cancel).await.unwrap();
    }

    let primary = h.service.paths().primary("global", "profile").unwrap();
    h.store.put_raw(primary.clone(), "{ not json");

    let first = h.service.load("global", "profile", MISSING, &cancel).await.unwrap();
    let second = h.service.load("global", "profile", MISSING, &cancel).await.unwrap();

    assert_eq!(first, Progress { v: 2 });
    assert_eq!(second, Progress { v: 2 });
    assert_eq!(h.events.count("save_corruption_detected"), 1);
    assert_eq!(h.events.count("save_restored_from_backup"), 1);
    assert_eq!(decode_stored(&h.store, &primary), Progress { v: 2 });
}

#[tokio::test]
async fn test_unusable_backups_are_skipped() {
    let h = harness(SaveSecurityConfig::default());
    let cancel = CancellationToken::new();
    for v in 1..=3 {
        h.service.save("global", "profile", &Progress { v }, &cancel).await.unwrap();
    }

    let paths = h.service.paths().clone();
    h.store.put_raw(paths.primary("global", "profile").unwrap(), "garbage");
    h.store.put_raw(paths.backup("global", "profile", 0).unwrap(), "also garbage");

    let loaded = h.service.load("global", "profile", MISSING, &cancel).await.unwrap();

    assert_eq!(loaded, Progress { v: 1 });
    assert!(h.events.events().iter().any(|e| matches!(
        e,
        FoundationEvent::SaveRestoredFromBackup { index: 1, .. }
    )));
}

#[tokio::test]
async fn test_backup_cap_discards_oldest() {
    let security = SaveSecurityConfig::default();
    let max = security.max_backup_files();
    let h = harness(security);
    let cancel = CancellationToken::new();

    let saves = max + 3;
    for v in 0..saves {
        h.service.save("global", "profile", &Progress { v: v as i32 }, &cancel).await.unwrap();
    }

    let backups = h.service.backup_paths("global", "profile").await.unwrap();
    assert_eq!(backups.len(), max);
    assert!(h.store.get_raw(&h.service.paths().backup("global", "profile", max).unwrap()).is_none());

    // newest backup holds the save before last, oldest kept is `max` saves back
    assert_eq!(backups.iter().map(|(index, _)| *index).collect::<Vec<_>>(), (0..max).collect::<Vec<_>>());
    assert_eq!(decode_stored(&h.store, &backups[0].1), Progress { v: (saves - 2) as i32 });
    assert_eq!(decode_stored(&h.store, &backups[max - 1].1), Progress { v: (saves - 1 - max) as i32 });
}

#[tokio::test]
async fn test_backups_disabled_writes_only_primary() {
    let h = harness(SaveSecurityConfig { enable_rolling_backups: false, ..Default::default() });
    let cancel = CancellationToken::new();
    for v in 0..4 {
        h.service.save("global", "profile", &Progress { v }, &cancel).await.unwrap();
    }

    assert_eq!(h.store.paths().len(), 1);
    assert_eq!(h.events.count("save_backup_written"), 0);
}

#[tokio::test]
async fn test_restore_disabled_falls_back() {
    let h = harness(SaveSecurityConfig {
        restore_from_backup_on_load_failure: false,
        ..Default::default()
    });
    let cancel = CancellationToken::new();
    h.service.save("global", "profile", &Progress { v: 1 }, &cancel).await.unwrap();
    h.service.save("global", "profile", &Progress { v: 2 }, &cancel).await.unwrap();
    h.store.put_raw(h.service.paths().primary("global", "profile").unwrap(), "");

    let loaded = h.service.load("global", "profile", MISSING, &cancel).await.unwrap();

    assert_eq!(loaded, MISSING);
    assert_eq!(h.events.count("save_corruption_detected"), 1);
    assert_eq!(h.events.count("save_load_failed"), 1);
    assert_eq!(h.events.count("save_restored_from_backup"), 0);
}

#[tokio::test]
async fn test_concurrent_saves_keep_backup_chain_consistent() {
    let h = Arc::new(harness(SaveSecurityConfig::default()));
    let cancel = CancellationToken::new();

    let saves = (0..10).map(|v| {
        let h = h.clone();
        let cancel = cancel.clone();
        async move { h.service.save("global", "profile", &Progress { v }, &cancel).await }
    });
    for result in futures::future::join_all(saves).await {
        result.unwrap();
    }

    let current = h.service.load("global", "profile", MISSING, &cancel).await.unwrap();
    let backups = h.service.backup_paths("global", "profile").await.unwrap();
    assert_eq!(backups.len(), 3);

    let mut seen = vec![current.v];
    for (_, path) in &backups {
        seen.push(decode_stored(&h.store, path).v);
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 4, "every backup must hold a distinct earlier save");
}

struct RenameLevel;

impl SaveMigration for RenameLevel {
    fn from_version(&self) -> u32 {
        1
    }

    fn to_version(&self) -> u32 {
        2
    }

    fn migrate(&self, payload: &str) -> Result<String, String> {
        Ok(payload.replace("\"lvl\"", "\"v\""))
    }
}

#[tokio::test]
async fn test_legacy_payload_is_migrated_and_written_back() {
    let h = harness(SaveSecurityConfig::default());
    let service = h
        .service
        .with_schema(SaveSchemaConfig { current_version: 2 })
        .with_migrations(SaveMigrationService::new(vec![Arc::new(RenameLevel)]));
    let primary = service.paths().primary("global", "profile").unwrap();
    h.store.put_raw(primary.clone(), r#"{"lvl":3}"#);

    let loaded = service.load("global", "profile", MISSING, &CancellationToken::new()).await.unwrap();

    assert_eq!(loaded, Progress { v: 3 });
    assert_eq!(extract_payload(&h.store.get_raw(&primary).unwrap()).1, 2);
    assert!(h.events.events().iter().any(|e| matches!(
        e,
        FoundationEvent::SaveMigrated { from_version: 1, to_version: 2, .. }
    )));
}

#[tokio::test]
async fn test_newer_schema_version_is_not_loaded() {
    let h = harness(SaveSecurityConfig { enable_rolling_backups: false, ..Default::default() });
    h.store.put_raw(
        h.service.paths().primary("global", "profile").unwrap(),
        r#"{"version":9,"payload":"{\"v\":1}"}"#,
    );

    let loaded = h.service.load("global", "profile", MISSING, &CancellationToken::new()).await.unwrap();
    assert_eq!(loaded, MISSING);
    assert_eq!(h.events.count("save_load_failed"), 1);
}

#[tokio::test]
async fn test_cancelled_save_leaves_state_untouched() {
    let h = harness(SaveSecurityConfig::default());
    let live = CancellationToken::new();
    h.service.save("global", "profile", &Progress { v: 1 }, &live).await.unwrap();
    let before = h.store.paths();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let result = h.service.save("global", "profile", &Progress { v: 2 }, &cancelled).await;

    assert!(matches!(result, Err(CoreError::Cancelled)));
    assert_eq!(h.store.paths(), before);
    assert_eq!(h.service.load("global", "profile", MISSING, &live).await.unwrap(), Progress { v: 1 });
}

#[tokio::test]
async fn test_delete_removes_primary_and_backups() {
    let h = harness(SaveSecurityConfig::default());
    let cancel = CancellationToken::new();
    for v in 0..3 {
        h.service.save("global", "profile", &Progress { v }, &cancel).await.unwrap();
    }
    h.service.save("global", "other", &Progress { v: 9 }, &cancel).await.unwrap();

    h.service.delete("global", "profile", &cancel).await.unwrap();

    assert!(!h.service.exists("global", "profile").await.unwrap());
    assert!(h.service.backup_paths("global", "profile").await.unwrap().is_empty());
    assert!(h.service.exists("global", "other").await.unwrap());
    assert_eq!(h.events.count("save_deleted"), 1);
}

#[tokio::test]
async fn test_blank_identifiers_are_rejected() {
    let h = harness(SaveSecurityConfig::default());
    let cancel = CancellationToken::new();

    let save = h.service.save(" ", "profile", &Progress { v: 1 }, &cancel).await;
    let load = h.service.load("global", "", MISSING, &cancel).await;

    assert!(matches!(save, Err(CoreError::InvalidArgument(_))));
    assert!(matches!(load, Err(CoreError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_file_store_with_integrity_envelope_recovers_from_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let security = SaveSecurityConfig::default();
    let serializer =
        SecureSaveSerializer::new(Arc::new(JsonSaveSerializer::new()), security.clone(), None).unwrap();
    let events = Arc::new(RecordingEventSink::default());
    let service = LocalSaveService::new(
        Arc::new(FileSaveStore::new()),
        Arc::new(serializer),
        SavePaths::new(dir.path(), "json"),
    )
    .with_security(security)
    .with_events(events.clone());
    let cancel = CancellationToken::new();

    service.save("player-1", "inventory", &Progress { v: 10 }, &cancel).await.unwrap();
    service.save("player-1", "inventory", &Progress { v: 20 }, &cancel).await.unwrap();

    let primary = dir.path().join("player-1").join("inventory.json");
    let tampered = std::fs::read_to_string(&primary).unwrap().replace("20", "99");
    std::fs::write(&primary, tampered).unwrap();

    let loaded = service.load("player-1", "inventory", MISSING, &cancel).await.unwrap();

    assert_eq!(loaded, Progress { v: 10 });
    assert!(dir.path().join("player-1").join("inventory.bak.0").exists());
    assert_eq!(events.count("save_restored_from_backup"), 1);
}

#[tokio::test]
async fn test_garbage_bytes_in_primary_restore_from_backup() {
    let dir = tempfile::tempdir().unwrap();
    let events = Arc::new(RecordingEventSink::default());
    let service = LocalSaveService::new(
        Arc::new(FileSaveStore::new()),
        Arc::new(JsonSaveSerializer::new()),
        SavePaths::new(dir.path(), "json"),
    )
    .with_events(events.clone());
    let cancel = CancellationToken::new();

    service.save("s", "k", &Progress { v: 1 }, &cancel).await.unwrap();
    service.save("s", "k", &Progress { v: 2 }, &cancel).await.unwrap();
    std::fs::write(dir.path().join("s").join("k.json"), [0xff, 0xfe, 0x00, 0x81]).unwrap();

    let loaded = service.load("s", "k", MISSING, &cancel).await.unwrap();

    assert_eq!(loaded, Progress { v: 1 });
    assert_eq!(events.count("save_corruption_detected"), 1);
    assert_eq!(events.count("save_restored_from_backup"), 1);
    assert_eq!(service.load("s", "k", MISSING, &cancel).await.unwrap(), Progress { v: 1 });
}

#[tokio::test]
async fn test_garbage_bytes_everywhere_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let service = LocalSaveService::new(
        Arc::new(FileSaveStore::new()),
        Arc::new(JsonSaveSerializer::new()),
        SavePaths::new(dir.path(), "json"),
    );
    let cancel = CancellationToken::new();

    service.save("s", "k", &Progress { v: 1 }, &cancel).await.unwrap();
    service.save("s", "k", &Progress { v: 2 }, &cancel).await.unwrap();
    std::fs::write(dir.path().join("s").join("k.json"), [0x81]).unwrap();
    std::fs::write(dir.path().join("s").join("k.bak.0"), [0xc3, 0x28]).unwrap();

    assert_eq!(service.load("s", "k", MISSING, &cancel).await.unwrap(), MISSING);
}

#[tokio::test]
async fn test_record_locks_are_released() {
    let h = harness(SaveSecurityConfig::default());
    let cancel = CancellationToken::new();

    let saves = (0..8).map(|v| {
        let service = &h.service;
        let cancel = &cancel;
        async move { service.save("global", &format!("slot-{}", v % 3), &Progress { v }, cancel).await }
    });
    for result in futures::future::join_all(saves).await {
        result.unwrap();
    }
    h.service.load("global", "slot-0", MISSING, &cancel).await.unwrap();
    assert_eq!(h.service.tracked_locks(), 0);

    h.service.delete("global", "slot-1", &cancel).await.unwrap();
    assert_eq!(h.service.tracked_locks(), 0);
}
