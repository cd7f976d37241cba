//! File-backed list snapshot storage
//!
//! Each list is one pretty-printed JSON file named after the list.
//! Example: list "Pantry" is stored at "Smart Inventory/All Lists/Pantry.json"

use crate::config::{LISTS_ROOT_DIR, LISTS_SUB_DIR, LIST_FILE_EXTENSION};
use crate::error::{AppError, Result};
use crate::models::InventoryList;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Source of stored list snapshots
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Names of every stored list, without file extension
    async fn list_names(&self) -> Result<BTreeSet<String>>;

    /// Load a snapshot. Fails with `ListNotFound` or `CorruptList`.
    async fn load(&self, name: &str) -> Result<InventoryList>;

    async fn save(&self, name: &str, list: &InventoryList) -> Result<()>;

    /// Returns `false` when there was nothing to delete
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// List store rooted in the application data directory
#[derive(Clone)]
pub struct FileListStore {
    root: PathBuf,
}

impl FileListStore {
    /// Create a store under `<data_dir>/Smart Inventory/All Lists`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join(LISTS_ROOT_DIR).join(LISTS_SUB_DIR),
        }
    }

    /// Create the list directory if needed
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("List store initialized at: {:?}", self.root);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get file path for a list, appending the extension when missing
    fn get_path(&self, name: &str) -> PathBuf {
        let suffix = format!(".{}", LIST_FILE_EXTENSION);
        if name.to_lowercase().ends_with(&suffix) {
            self.root.join(name)
        } else {
            self.root.join(format!("{}{}", name, suffix))
        }
    }
}

#[async_trait]
impl ListStore for FileListStore {
    async fn list_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();

        if !self.root.exists() {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let is_list = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(LIST_FILE_EXTENSION));

            if let (true, Some(stem)) = (is_list, path.file_stem().and_then(|s| s.to_str())) {
                names.insert(stem.to_string());
            }
        }

        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<InventoryList> {
        let path = self.get_path(name);

        if !path.exists() {
            return Err(AppError::ListNotFound(name.to_string()));
        }

        let content = fs::read_to_string(&path).await?;
        let list = serde_json::from_str(&content)
            .map_err(|e| AppError::CorruptList(format!("{}: {}", name, e)))?;

        tracing::debug!("Loaded list '{}' from {:?}", name, path);
        Ok(list)
    }

    async fn save(&self, name: &str, list: &InventoryList) -> Result<()> {
        let path = self.get_path(name);
        fs::create_dir_all(&self.root).await?;

        let content = serde_json::to_string_pretty(list)?;

        // Write to temp file first (atomic replace)
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(temp_path, &path).await?;

        tracing::debug!("Saved list '{}' ({} items)", name, list.items.len());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.get_path(name);

        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path).await?;

        tracing::debug!("Deleted list: {}", name);
        Ok(true)
    }
}
