//! Local save persistence.
//!
//! - `store` / `file_store`: where text lives (memory or filesystem)
//! - `serializer` / `secure`: model ⇄ text, with optional integrity envelope
//! - `migration`: schema version envelope and upgrade chain
//! - `local`: [`LocalSaveService`], the rolling-backup save/load pipeline

mod file_store;
mod local;
mod migration;
mod paths;
mod secure;
mod serializer;
mod store;

pub(crate) use file_store::{atomic_write_text, read_lossy};
pub use file_store::FileSaveStore;
pub use local::LocalSaveService;
pub use migration::{SaveMigration, SaveMigrationService};
pub use paths::{data_dir, default_root, SavePaths, DATA_DIR_ENV};
pub use secure::{PayloadCipher, SecureSaveSerializer};
pub use serializer::{deserialize_model, serialize_model, JsonSaveSerializer, SaveSerializer};
pub use store::{MemorySaveStore, SaveStore};

#[cfg(test)]
mod tests;
