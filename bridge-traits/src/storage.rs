//! Offline Storage Abstraction
//!
//! Persists the documents that describe items downloaded for offline
//! playback. The media bytes themselves are written by the engine; the core
//! only records where they live and what they are.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Artwork captured alongside an offline item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtwork {
    /// MIME type reported by the server, when known.
    pub mime_type: Option<String>,
    /// Base64 (standard alphabet) encoded image bytes.
    pub data_base64: String,
}

/// Document persisted for an item available offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineDocument {
    /// Identity of the item; also the store key.
    pub item_id: String,
    /// Where the engine placed the downloaded media.
    pub local_path: PathBuf,
    /// Serialized item metadata.
    pub metadata: serde_json::Value,
    /// Artwork fetched at download time, if any.
    pub artwork: Option<StoredArtwork>,
    /// When the document was written.
    pub cached_at: DateTime<Utc>,
}

/// Offline document store trait
///
/// Keyed by item identity; saving an existing key replaces the document.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::OfflineStore;
///
/// async fn is_offline(store: &dyn OfflineStore, id: &str) -> bool {
///     matches!(store.load(id).await, Ok(Some(_)))
/// }
/// ```
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Persist (or replace) the document for `item_id`.
    async fn save(&self, item_id: &str, document: OfflineDocument) -> Result<()>;

    /// Load a previously saved document.
    async fn load(&self, item_id: &str) -> Result<Option<OfflineDocument>>;

    /// Remove the document. Removing a missing key is not an error.
    async fn remove(&self, item_id: &str) -> Result<()>;
}
