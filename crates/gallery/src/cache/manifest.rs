//! # Manifest Store
//!
//! Persists the last successful [`ManifestSnapshot`] as `links/links.json`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::cache::store::DiskStore;
use crate::cache::types::Namespace;
use crate::error::Result;
use crate::models::ManifestSnapshot;

const MANIFEST_FILE_NAME: &str = "links.json";

#[derive(Debug, Clone)]
pub struct ManifestStore {
    store: DiskStore,
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(store: &DiskStore) -> Self {
        Self {
            store: store.clone(),
            path: store.namespace_dir(Namespace::Links).join(MANIFEST_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot, `None` when nothing has been saved
    pub async fn load(&self) -> Result<Option<ManifestSnapshot>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read persisted manifest");
                return Err(e.into());
            }
        };

        let snapshot: ManifestSnapshot = serde_json::from_slice(&bytes)?;
        debug!(
            path = ?self.path,
            records = snapshot.records.len(),
            "Loaded persisted manifest"
        );
        Ok(Some(snapshot))
    }

    /// Replace the persisted snapshot atomically
    pub async fn save(&self, snapshot: &ManifestSnapshot) -> Result<()> {
        self.store.ensure_namespace(Namespace::Links).await?;

        let json = serde_json::to_vec_pretty(snapshot)?;
        let temp_path = self.path.with_extension("json.tmp");

        if let Err(e) = fs::write(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(path = ?self.path, records = snapshot.records.len(), "Persisted manifest");
        Ok(())
    }

    /// Remove the persisted snapshot if there is one
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
