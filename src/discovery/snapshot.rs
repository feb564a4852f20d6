//! Persisted catalogue snapshot
//!
//! Layout: `<base>/<Service_Name>/info.json` plus `openapi.json` once the
//! interface description has been fetched. Persisting a new service list
//! replaces the previous one. Only directories holding a snapshot
//! `info.json` are treated as delisted services; anything else under the
//! base path is left alone.

use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::descriptor::ServiceDescriptor;
use crate::error::{ResolverError, Result};

const INFO_FILE: &str = "info.json";
const DESCRIPTION_FILE: &str = "openapi.json";

/// A service read back from disk
#[derive(Debug, Clone)]
pub struct PersistedService {
    pub descriptor: ServiceDescriptor,
    pub description: Option<Value>,
}

pub struct SnapshotStore {
    base_path: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn service_dir(&self, descriptor: &ServiceDescriptor) -> Result<PathBuf> {
        let name = descriptor.directory_name();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ResolverError::Storage(format!(
                "service name '{}' cannot be used as a directory",
                descriptor.service_name
            )));
        }
        Ok(self.base_path.join(name))
    }

    /// Write `info.json` for every service and drop directories of services
    /// that are no longer listed.
    pub async fn persist(&self, services: &[ServiceDescriptor]) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;

        let mut keep = HashSet::new();
        for descriptor in services {
            let dir = match self.service_dir(descriptor) {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::warn!(service = %descriptor.service_name, error = %e, "Skipping snapshot entry");
                    continue;
                }
            };
            tokio::fs::create_dir_all(&dir).await?;
            write_json(&dir.join(INFO_FILE), &serde_json::to_value(descriptor).map_err(storage)?).await?;
            keep.insert(descriptor.directory_name());
        }

        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !keep.contains(&name) {
                self.remove_delisted(&entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Remove the snapshot files of a delisted service, and its directory
    /// once nothing else is left in it
    async fn remove_delisted(&self, dir: &Path) -> Result<()> {
        let info = dir.join(INFO_FILE);
        let ours = read_json(&info)
            .await
            .and_then(|v| serde_json::from_value::<ServiceDescriptor>(v).map_err(storage))
            .is_ok();
        if !ours {
            return Ok(());
        }

        tracing::debug!(directory = %dir.display(), "Removing snapshot of delisted service");
        tokio::fs::remove_file(&info).await?;
        let description = dir.join(DESCRIPTION_FILE);
        if tokio::fs::try_exists(&description).await? {
            tokio::fs::remove_file(&description).await?;
        }
        if let Err(e) = tokio::fs::remove_dir(dir).await {
            tracing::debug!(directory = %dir.display(), error = %e, "Keeping non-empty directory");
        }
        Ok(())
    }

    /// Store the interface description next to the service's `info.json`
    pub async fn store_description(&self, descriptor: &ServiceDescriptor, description: &Value) -> Result<()> {
        let dir = self.service_dir(descriptor)?;
        tokio::fs::create_dir_all(&dir).await?;
        write_json(&dir.join(DESCRIPTION_FILE), description).await
    }

    /// Read the snapshot back, ordered by service id. A missing base directory
    /// is an empty snapshot; unreadable entries are skipped.
    pub async fn load(&self) -> Result<Vec<PersistedService>> {
        if !tokio::fs::try_exists(&self.base_path).await? {
            return Ok(Vec::new());
        }

        let mut services = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let dir = entry.path();
            let descriptor = match read_json(&dir.join(INFO_FILE)).await.and_then(|v| {
                serde_json::from_value::<ServiceDescriptor>(v).map_err(storage)
            }) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Ignoring unreadable snapshot entry");
                    continue;
                }
            };

            let description_path = dir.join(DESCRIPTION_FILE);
            let description = if tokio::fs::try_exists(&description_path).await? {
                match read_json(&description_path).await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(path = %description_path.display(), error = %e, "Ignoring unreadable interface description");
                        None
                    }
                }
            } else {
                None
            };

            services.push(PersistedService {
                descriptor,
                description,
            });
        }

        services.sort_by_key(|s| s.descriptor.id);
        Ok(services)
    }
}

fn storage(err: serde_json::Error) -> ResolverError {
    ResolverError::Storage(err.to_string())
}

async fn write_json(path: &Path, value: &Value) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(storage)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

async fn read_json(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::descriptor::fixtures::descriptor;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("services"));

        let services = vec![
            descriptor("Event Interpretation Service", 3, &["events"]),
            descriptor("Product Model Metadata Catalogue", 2, &["metadata-provider"]),
        ];
        store.persist(&services).await.unwrap();
        store
            .store_description(&services[1], &json!({"openapi": "3.0.0", "paths": {}}))
            .await
            .unwrap();

        assert!(temp_dir
            .path()
            .join("services/Product_Model_Metadata_Catalogue/info.json")
            .exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].descriptor, services[1]);
        assert_eq!(loaded[0].description.as_ref().unwrap()["openapi"], "3.0.0");
        assert!(loaded[1].description.is_none());
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        store
            .persist(&[descriptor("Old Service", 1, &[]), descriptor("Kept Service", 2, &[])])
            .await
            .unwrap();
        store.persist(&[descriptor("Kept Service", 2, &[])]).await.unwrap();

        assert!(!temp_dir.path().join("Old_Service").exists());
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].descriptor.service_name, "Kept Service");
    }

    #[tokio::test]
    async fn test_load_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("never-written"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_service_name_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        store
            .persist(&[descriptor("../escape", 1, &[]), descriptor("Safe", 2, &[])])
            .await
            .unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].descriptor.service_name, "Safe");
    }

    #[tokio::test]
    async fn test_persist_leaves_foreign_directories() {
        let temp_dir = TempDir::new().unwrap();
        let foreign = temp_dir.path().join("unrelated_user_data");
        std::fs::create_dir_all(&foreign).unwrap();
        std::fs::write(foreign.join("important.txt"), "keep me").unwrap();
        std::fs::write(foreign.join("info.json"), r#"{"not": "a service"}"#).unwrap();

        let store = SnapshotStore::new(temp_dir.path());
        store.persist(&[descriptor("Old Service", 1, &[])]).await.unwrap();
        std::fs::write(temp_dir.path().join("Old_Service/notes.txt"), "local").unwrap();
        store.persist(&[]).await.unwrap();

        assert!(foreign.join("important.txt").exists());
        assert!(foreign.join("info.json").exists());
        // snapshot files go, files added by hand stay
        assert!(!temp_dir.path().join("Old_Service/info.json").exists());
        assert!(temp_dir.path().join("Old_Service/notes.txt").exists());
    }
}
