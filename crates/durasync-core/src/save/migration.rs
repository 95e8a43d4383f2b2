//! Schema versioning for stored payloads.
//!
//! Every primary and backup file holds
//! `{ "version": N, "payload": "<serializer text>" }`. Anything else is read as
//! a version 1 payload so files written before versioning keep loading.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct VersionedEnvelope {
    version: u32,
    payload: String,
}

/// Wrap serializer text with its schema version.
pub(crate) fn wrap_payload(payload: &str, version: u32) -> String {
    let envelope = VersionedEnvelope { version: version.max(1), payload: payload.to_string() };
    // A struct of a u32 and a String cannot fail to serialize.
    serde_json::to_string(&envelope).unwrap_or_else(|_| payload.to_string())
}

/// Split raw file text into `(payload, version)`.
pub(crate) fn extract_payload(raw: &str) -> (String, u32) {
    match serde_json::from_str::<VersionedEnvelope>(raw) {
        Ok(envelope) if envelope.version >= 1 && !envelope.payload.is_empty() => {
            (envelope.payload, envelope.version)
        }
        _ => (raw.to_string(), 1),
    }
}

/// One upgrade step between two schema versions.
pub trait SaveMigration: Send + Sync {
    fn from_version(&self) -> u32;
    fn to_version(&self) -> u32;

    /// Restrict the step to some records. Defaults to all of them.
    fn applies_to(&self, _slot: &str, _key: &str) -> bool {
        true
    }

    fn migrate(&self, payload: &str) -> Result<String, String>;
}

/// Ordered chain of [`SaveMigration`] steps.
#[derive(Clone, Default)]
pub struct SaveMigrationService {
    migrations: Vec<Arc<dyn SaveMigration>>,
}

impl SaveMigrationService {
    pub fn new(migrations: Vec<Arc<dyn SaveMigration>>) -> Self {
        Self { migrations }
    }

    pub fn register(&mut self, migration: Arc<dyn SaveMigration>) {
        self.migrations.push(migration);
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Upgrade `payload` from `from_version` to `to_version`.
    ///
    /// Returns the reached version with the migrated payload. Downgrades and
    /// gaps in the chain are errors.
    pub fn migrate(
        &self,
        slot: &str,
        key: &str,
        from_version: u32,
        to_version: u32,
        payload: &str,
    ) -> Result<(u32, String), String> {
        if to_version < 1 {
            return Err("Target schema version is invalid".to_string());
        }
        if from_version > to_version {
            return Err(format!(
                "Downgrade migrations are not supported: v{} > v{}",
                from_version, to_version
            ));
        }

        let mut version = from_version;
        let mut current = payload.to_string();
        while version < to_version {
            let step = self
                .find_step(slot, key, version)
                .ok_or_else(|| format!("Missing migration for {}/{} from v{}", slot, key, version))?;
            current = step.migrate(&current)?;
            version = step.to_version();
        }

        Ok((version, current))
    }

    fn find_step(&self, slot: &str, key: &str, from_version: u32) -> Option<&Arc<dyn SaveMigration>> {
        self.migrations.iter().find(|m| {
            m.from_version() == from_version
                && m.to_version() > m.from_version()
                && m.applies_to(slot, key)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct RenameField {
        from: u32,
        to: u32,
        old: &'static str,
        new: &'static str,
    }

    impl SaveMigration for RenameField {
        fn from_version(&self) -> u32 {
            self.from
        }

        fn to_version(&self) -> u32 {
            self.to
        }

        fn applies_to(&self, slot: &str, _key: &str) -> bool {
            slot == "global"
        }

        fn migrate(&self, payload: &str) -> Result<String, String> {
            Ok(payload.replace(self.old, self.new))
        }
    }

    fn chain() -> SaveMigrationService {
        SaveMigrationService::new(vec![
            Arc::new(RenameField { from: 2, to: 3, old: "gold", new: "coins" }),
            Arc::new(RenameField { from: 1, to: 2, old: "lvl", new: "level" }),
        ])
    }

    #[test]
    fn test_envelope_and_legacy_text() {
        let wrapped = wrap_payload(r#"{"v":1}"#, 2);
        assert_eq!(extract_payload(&wrapped), (r#"{"v":1}"#.to_string(), 2));

        assert_eq!(extract_payload(r#"{"v":1}"#), (r#"{"v":1}"#.to_string(), 1));
        assert_eq!(extract_payload(r#"{"version":0,"payload":"x"}"#).1, 1);
    }

    #[test]
    fn test_chain_runs_in_version_order() {
        let (version, payload) =
            chain().migrate("global", "profile", 1, 3, r#"{"lvl":2,"gold":5}"#).unwrap();
        assert_eq!(version, 3);
        assert_eq!(payload, r#"{"level":2,"coins":5}"#);
    }

    #[test]
    fn test_same_version_is_identity() {
        assert_eq!(chain().migrate("global", "p", 3, 3, "x").unwrap(), (3, "x".to_string()));
    }

    #[test]
    fn test_gap_downgrade_and_scope_fail() {
        let service = chain();
        assert!(service.migrate("global", "p", 3, 2, "x").is_err());
        assert!(service.migrate("global", "p", 1, 4, "x").is_err());
        assert!(service.migrate("player-1", "p", 1, 2, "x").is_err());
        assert!(SaveMigrationService::default().migrate("global", "p", 1, 2, "x").is_err());
    }
}
