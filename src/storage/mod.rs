//! Storage abstractions for manifest and content persistence.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── record/
//! │   └── {group}/BlogStatus.json     # Member-bucketed manifest
//! ├── blogContent/
//! │   └── {group}/{itemId}.html       # Raw content, written once
//! └── blogContent_TC/
//!     └── {group}/{itemId}.html       # Translated content
//! ```

pub mod local;
pub mod lock;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ItemMap;

// Re-export for convenience
pub use local::LocalStorage;
pub use lock::GroupLocks;

/// Trait for content store backends.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load a group's manifest as an id-indexed map.
    ///
    /// A missing or unreadable manifest yields an empty map.
    async fn load_manifest(&self, group_id: &str) -> ItemMap;

    /// Persist a group's manifest atomically.
    async fn save_manifest(&self, group_id: &str, items: &ItemMap) -> Result<()>;

    /// Write raw content unless a blob already exists for the item.
    ///
    /// Returns whether a write happened.
    async fn write_blob_if_absent(&self, group_id: &str, item_id: &str, content: &str)
        -> Result<bool>;

    /// Whether raw content exists for the item.
    async fn has_blob(&self, group_id: &str, item_id: &str) -> Result<bool>;

    /// Read raw content for the item.
    async fn read_blob(&self, group_id: &str, item_id: &str) -> Result<Option<String>>;

    /// Groups that have a content directory.
    async fn list_blob_groups(&self) -> Result<Vec<String>>;

    /// Ids of all raw content blobs for a group, sorted.
    async fn list_blobs(&self, group_id: &str) -> Result<Vec<String>>;

    /// Whether translated content exists for the item.
    async fn has_translation(&self, group_id: &str, item_id: &str) -> Result<bool>;

    /// Write translated content for the item.
    async fn write_translation(&self, group_id: &str, item_id: &str, content: &str)
        -> Result<()>;

    /// Lock serializing writers of one group.
    fn group_lock(&self, group_id: &str) -> Arc<tokio::sync::Mutex<()>>;
}
