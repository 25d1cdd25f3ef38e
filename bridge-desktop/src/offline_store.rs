//! Offline document store backed by JSON files.
//!
//! One document per item, written to `<root>/<encoded id>.json`. Item ids are
//! base64url-encoded so arbitrary identifiers map to safe file names.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bridge_traits::{
    error::Result,
    storage::{OfflineDocument, OfflineStore},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct FileOfflineStore {
    root: PathBuf,
}

impl FileOfflineStore {
    /// Store documents under `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the system temporary directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("mpc-player").join("offline"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, item_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(item_id.as_bytes())))
    }
}

#[async_trait]
impl OfflineStore for FileOfflineStore {
    async fn save(&self, item_id: &str, document: OfflineDocument) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let json = serde_json::to_vec_pretty(&document)?;

        // Write then rename so readers never see a half-written document.
        let path = self.document_path(item_id);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, &json).await?;
        fs::rename(&staging, &path).await?;

        debug!(item_id, path = ?path, size = json.len(), "Saved offline document");
        Ok(())
    }

    async fn load(&self, item_id: &str) -> Result<Option<OfflineDocument>> {
        let bytes = match fs::read(self.document_path(item_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn remove(&self, item_id: &str) -> Result<()> {
        match fs::remove_file(self.document_path(item_id)).await {
            Ok(()) => {
                debug!(item_id, "Removed offline document");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scratch_store() -> FileOfflineStore {
        FileOfflineStore::new(
            std::env::temp_dir()
                .join("mpc-player-tests")
                .join(uuid::Uuid::new_v4().to_string()),
        )
    }

    fn document(item_id: &str) -> OfflineDocument {
        OfflineDocument {
            item_id: item_id.to_string(),
            local_path: PathBuf::from("/downloads/track.m4a"),
            metadata: serde_json::json!({ "title": "Song" }),
            artwork: None,
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_load_remove() {
        let store = scratch_store();
        let doc = document("track/1?x=y");

        store.save("track/1?x=y", doc.clone()).await.unwrap();
        assert_eq!(store.load("track/1?x=y").await.unwrap(), Some(doc));

        store.remove("track/1?x=y").await.unwrap();
        assert_eq!(store.load("track/1?x=y").await.unwrap(), None);

        let _ = fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn test_missing_document() {
        let store = scratch_store();

        assert_eq!(store.load("absent").await.unwrap(), None);
        store.remove("absent").await.unwrap();
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = scratch_store();
        store.save("a", document("a")).await.unwrap();

        let mut updated = document("a");
        updated.metadata = serde_json::json!({ "title": "Remastered" });
        store.save("a", updated.clone()).await.unwrap();

        assert_eq!(store.load("a").await.unwrap(), Some(updated));
        let _ = fs::remove_dir_all(store.root()).await;
    }

    #[test]
    fn test_ids_map_to_distinct_file_names() {
        let store = FileOfflineStore::new("/offline");
        let a = store.document_path("a/b");
        let b = store.document_path("a_b");

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/offline")));
    }
}
