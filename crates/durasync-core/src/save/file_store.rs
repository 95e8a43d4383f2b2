//! Filesystem-backed [`SaveStore`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::store::SaveStore;
use crate::error::CoreResult;

#[derive(Debug, Default, Clone, Copy)]
pub struct FileSaveStore;

impl FileSaveStore {
    pub fn new() -> Self {
        Self
    }
}

/// Write `text` next to `path`, then rename over it.
///
/// A crash leaves either the old file or the new one, never a torn write.
pub(crate) async fn atomic_write_text(path: &Path, text: &str) -> CoreResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await?;
        }
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = tokio::fs::write(&temp_path, text).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Read `path` as text. Invalid UTF-8 is replaced, not rejected, so garbage
/// bytes reach the decoder as corruption instead of failing the read.
pub(crate) async fn read_lossy(path: &Path) -> CoreResult<Option<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl SaveStore for FileSaveStore {
    async fn exists(&self, path: &Path) -> CoreResult<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn read_text(&self, path: &Path) -> CoreResult<Option<String>> {
        read_lossy(path).await
    }

    async fn write_text(&self, path: &Path, text: &str) -> CoreResult<()> {
        atomic_write_text(path, text).await
    }

    async fn delete(&self, path: &Path) -> CoreResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_directories_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global").join("profile.json");
        let store = FileSaveStore::new();

        store.write_text(&path, "{\"v\":1}").await.unwrap();

        assert!(store.exists(&path).await.unwrap());
        assert_eq!(store.read_text(&path).await.unwrap().as_deref(), Some("{\"v\":1}"));
        assert!(!temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_missing_file_reads_none_and_deletes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let store = FileSaveStore::new();

        assert!(!store.exists(&path).await.unwrap());
        assert_eq!(store.read_text(&path).await.unwrap(), None);
        store.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_utf8_reads_as_replacement_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.json");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();

        let text = FileSaveStore::new().read_text(&path).await.unwrap().unwrap();

        assert!(text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.json");
        let store = FileSaveStore::new();

        store.write_text(&path, "first").await.unwrap();
        store.write_text(&path, "second").await.unwrap();

        assert_eq!(store.read_text(&path).await.unwrap().as_deref(), Some("second"));
    }
}
