//! # Disk Store
//!
//! Layout of the cache root: one directory per [`Namespace`].

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::cache::types::{CacheKey, CacheResult, Namespace};
use crate::error::{GalleryError, Result};

#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open the cache root, creating it and every namespace directory.
    ///
    /// Fails with [`GalleryError::DirectoryCreationFailed`] naming the directory
    /// that could not be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };

        for namespace in Namespace::ALL {
            let dir = store.namespace_dir(namespace);
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| GalleryError::DirectoryCreationFailed {
                    path: dir.clone(),
                    source,
                })?;
        }

        debug!(root = ?store.root, "Cache directories ready");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    /// Path of the file holding `key`
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.namespace_dir(key.variant.namespace())
            .join(key.to_filename())
    }

    /// Make sure the namespace directory exists before touching files in it.
    ///
    /// Recreates it if it was removed after [`DiskStore::open`].
    pub async fn ensure_namespace(&self, namespace: Namespace) -> CacheResult<PathBuf> {
        let dir = self.namespace_dir(namespace);
        if !fs::try_exists(&dir).await? {
            fs::create_dir_all(&dir).await?;
            debug!(namespace = %namespace, "Recreated cache namespace");
        }
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn open_creates_every_namespace() {
        let temp = tempfile::tempdir().unwrap();
        let store = DiskStore::open(temp.path().join("cache")).await.unwrap();

        for namespace in Namespace::ALL {
            assert!(store.namespace_dir(namespace).is_dir());
        }

        let key = CacheKey::thumbnail(Url::parse("https://x/a.png").unwrap(), 64);
        assert!(store.entry_path(&key).starts_with(temp.path().join("cache/thumbnails")));
    }

    #[tokio::test]
    async fn open_reports_the_failing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = DiskStore::open(&blocker).await.unwrap_err();
        match err {
            GalleryError::DirectoryCreationFailed { path, .. } => {
                assert!(path.starts_with(&blocker));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ensure_namespace_recreates_removed_directory() {
        let temp = tempfile::tempdir().unwrap();
        let store = DiskStore::open(temp.path()).await.unwrap();
        std::fs::remove_dir_all(store.namespace_dir(Namespace::Originals)).unwrap();

        let dir = store.ensure_namespace(Namespace::Originals).await.unwrap();
        assert!(dir.is_dir());
    }
}
