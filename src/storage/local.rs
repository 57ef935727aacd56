//! Local filesystem storage implementation.
//!
//! ## Features
//!
//! - **Atomic manifest writes**: write to a temp file, then rename over the
//!   previous manifest, so a crash never leaves a half-written file.
//! - **Write-once blobs**: raw content is never overwritten once captured.
//! - **Tolerant loads**: a missing or corrupt manifest reads as empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::manifest::{build_records, flatten_records};
use crate::models::{CohortMap, Config, ItemMap, MemberRecord, PathsConfig};
use crate::storage::{ContentStore, GroupLocks};

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    paths: PathsConfig,
    cohorts: HashMap<String, CohortMap>,
    locks: Arc<GroupLocks>,
}

impl LocalStorage {
    /// Create a new LocalStorage with the given layout.
    pub fn new(paths: PathsConfig) -> Self {
        Self {
            paths,
            cohorts: HashMap::new(),
            locks: Arc::new(GroupLocks::new()),
        }
    }

    /// Create a LocalStorage with every configured group's cohorts registered.
    pub fn from_config(config: &Config) -> Self {
        config
            .groups
            .iter()
            .fold(Self::new(config.paths.clone()), |storage, group| {
                storage.with_cohorts(&group.id, group.cohorts.clone())
            })
    }

    /// Register the shared-column cohorts used when bucketing a group.
    pub fn with_cohorts(mut self, group_id: &str, cohorts: CohortMap) -> Self {
        self.cohorts.insert(group_id.to_string(), cohorts);
        self
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    fn manifest_path(&self, group_id: &str) -> PathBuf {
        self.paths
            .root
            .join(&self.paths.record_dir)
            .join(group_id)
            .join(&self.paths.manifest_file)
    }

    fn content_dir(&self, group_id: &str) -> PathBuf {
        self.paths.root.join(&self.paths.content_dir).join(group_id)
    }

    fn translated_dir(&self, group_id: &str) -> PathBuf {
        self.paths.root.join(&self.paths.translated_dir).join(group_id)
    }

    fn blob_file_name(&self, item_id: &str) -> String {
        format!("{}.{}", item_id, self.paths.blob_extension)
    }

    /// Reject keys that would escape their directory.
    fn check_key(kind: &str, key: &str) -> Result<()> {
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
            return Err(AppError::validation(format!("invalid {kind} '{key}'")));
        }
        Ok(())
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(parent, e))?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::storage(path, e));
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn exists(path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    /// Names of entries in a directory, or empty if it doesn't exist.
    async fn read_dir_entries(dir: &Path, want_dirs: bool) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() != want_dirs {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ContentStore for LocalStorage {
    async fn load_manifest(&self, group_id: &str) -> ItemMap {
        let path = self.manifest_path(group_id);
        let bytes = match Self::read_bytes(&path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return ItemMap::new(),
            Err(e) => {
                log::warn!("Failed to read manifest {}: {}", path.display(), e);
                return ItemMap::new();
            }
        };

        match serde_json::from_slice::<Vec<MemberRecord>>(&bytes) {
            Ok(records) => flatten_records(records),
            Err(e) => {
                log::warn!("Ignoring unparseable manifest {}: {}", path.display(), e);
                ItemMap::new()
            }
        }
    }

    async fn save_manifest(&self, group_id: &str, items: &ItemMap) -> Result<()> {
        Self::check_key("group id", group_id)?;

        let empty = CohortMap::new();
        let cohorts = self.cohorts.get(group_id).unwrap_or(&empty);
        let records = build_records(group_id, items, cohorts);
        let bytes = serde_json::to_vec_pretty(&records)?;

        let path = self.manifest_path(group_id);
        Self::write_bytes(&path, &bytes).await?;
        log::debug!(
            "Manifest for {}: {} items in {} member records written to {}",
            group_id,
            items.len(),
            records.len(),
            path.display()
        );
        Ok(())
    }

    async fn write_blob_if_absent(
        &self,
        group_id: &str,
        item_id: &str,
        content: &str,
    ) -> Result<bool> {
        Self::check_key("group id", group_id)?;
        Self::check_key("item id", item_id)?;

        if content.is_empty() {
            log::debug!("Empty content for {}/{}, nothing to write", group_id, item_id);
            return Ok(false);
        }

        let path = self.content_dir(group_id).join(self.blob_file_name(item_id));
        if Self::exists(&path).await? {
            return Ok(false);
        }

        Self::write_bytes(&path, content.as_bytes()).await?;
        Ok(true)
    }

    async fn has_blob(&self, group_id: &str, item_id: &str) -> Result<bool> {
        Self::check_key("group id", group_id)?;
        Self::check_key("item id", item_id)?;
        Self::exists(&self.content_dir(group_id).join(self.blob_file_name(item_id))).await
    }

    async fn read_blob(&self, group_id: &str, item_id: &str) -> Result<Option<String>> {
        Self::check_key("group id", group_id)?;
        Self::check_key("item id", item_id)?;
        let path = self.content_dir(group_id).join(self.blob_file_name(item_id));
        match Self::read_bytes(&path).await? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    async fn list_blob_groups(&self) -> Result<Vec<String>> {
        Self::read_dir_entries(&self.paths.root.join(&self.paths.content_dir), true).await
    }

    async fn list_blobs(&self, group_id: &str) -> Result<Vec<String>> {
        Self::check_key("group id", group_id)?;
        let suffix = format!(".{}", self.paths.blob_extension);
        let names = Self::read_dir_entries(&self.content_dir(group_id), false).await?;
        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn has_translation(&self, group_id: &str, item_id: &str) -> Result<bool> {
        Self::check_key("group id", group_id)?;
        Self::check_key("item id", item_id)?;
        Self::exists(&self.translated_dir(group_id).join(self.blob_file_name(item_id))).await
    }

    async fn write_translation(&self, group_id: &str, item_id: &str, content: &str) -> Result<()> {
        Self::check_key("group id", group_id)?;
        Self::check_key("item id", item_id)?;
        let path = self.translated_dir(group_id).join(self.blob_file_name(item_id));
        Self::write_bytes(&path, content.as_bytes()).await
    }

    fn group_lock(&self, group_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.get(group_id)
    }
}
