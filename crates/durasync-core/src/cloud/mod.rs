//! Cloud save synchronization.
//!
//! [`CloudSaveSyncService`] mirrors [`LocalSaveService`](crate::save::LocalSaveService)
//! records to a [`BackendStore`] and settles conflicts through a
//! [`ConflictResolver`].

mod backend;
mod resolver;
mod retrying;
mod sync;

pub use backend::{BackendProvider, BackendStore, InMemoryBackendStore, NullBackendStore};
pub use resolver::{ConflictResolver, PreferCloudResolver, PreferLocalResolver};
pub use retrying::RetryingBackendStore;
pub use sync::CloudSaveSyncService;
