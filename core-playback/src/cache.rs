//! # Offline Write-Through
//!
//! When the engine finishes downloading a streamed item, the player records
//! it in the host's [`OfflineStore`] so it can later be played from disk.
//! Caching is opportunistic: every failure ends up as a [`CacheOutcome`]
//! and never affects playback.

use crate::item::{ItemId, PlayableItem};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bridge_traits::{Clock, HttpClient, HttpRequest, OfflineDocument, OfflineStore, StoredArtwork};
use core_runtime::events::CacheEvent;
use core_runtime::logging::{redact_url, strip_path};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const ARTWORK_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of one caching attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    Cached {
        item_id: ItemId,
        local_path: PathBuf,
    },
    Skipped {
        item_id: Option<ItemId>,
        reason: String,
    },
    Failed {
        item_id: ItemId,
        message: String,
    },
}

impl CacheOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, CacheOutcome::Cached { .. })
    }

    pub fn to_event(&self) -> CacheEvent {
        match self {
            CacheOutcome::Cached {
                item_id,
                local_path,
            } => CacheEvent::ItemCached {
                item_id: item_id.to_string(),
                local_path: local_path.display().to_string(),
            },
            CacheOutcome::Skipped { item_id, reason } => CacheEvent::CachingSkipped {
                item_id: item_id.as_ref().map(ToString::to_string),
                reason: reason.clone(),
            },
            CacheOutcome::Failed { item_id, message } => CacheEvent::CachingFailed {
                item_id: item_id.to_string(),
                message: message.clone(),
            },
        }
    }
}

/// Persists offline documents for downloaded items.
#[derive(Clone)]
pub struct OfflineCacher {
    store: Option<Arc<dyn OfflineStore>>,
    http: Option<Arc<dyn HttpClient>>,
    clock: Arc<dyn Clock>,
    fetch_artwork: bool,
}

impl OfflineCacher {
    pub fn new(
        store: Option<Arc<dyn OfflineStore>>,
        http: Option<Arc<dyn HttpClient>>,
        clock: Arc<dyn Clock>,
        fetch_artwork: bool,
    ) -> Self {
        Self {
            store,
            http,
            clock,
            fetch_artwork,
        }
    }

    pub fn with_artwork_fetch(mut self, enabled: bool) -> Self {
        self.fetch_artwork = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Record `item` as available at `local_path`.
    #[instrument(skip(self, item, local_path), fields(item_id = %item.id))]
    pub async fn cache(&self, item: PlayableItem, local_path: PathBuf) -> CacheOutcome {
        let Some(store) = self.store.as_ref() else {
            return CacheOutcome::Skipped {
                item_id: Some(item.id),
                reason: "offline store not configured".to_string(),
            };
        };
        if item.id.is_empty() {
            warn!("Downloaded item has no identity");
            return CacheOutcome::Skipped {
                item_id: None,
                reason: "item has no id".to_string(),
            };
        }
        if !PlayableItem::has_local_extension(&local_path) {
            let file = local_path.display().to_string();
            warn!(file = strip_path(&file), "Downloaded file has no extension");
            return CacheOutcome::Skipped {
                item_id: Some(item.id),
                reason: "downloaded file has no extension".to_string(),
            };
        }

        let mut offline = item.clone();
        offline.mark_offline(local_path.clone());
        let metadata = match serde_json::to_value(&offline) {
            Ok(value) => value,
            Err(err) => {
                return CacheOutcome::Failed {
                    item_id: item.id,
                    message: format!("failed to serialize item: {}", err),
                }
            }
        };

        let artwork = if self.fetch_artwork {
            self.download_artwork(&item).await
        } else {
            None
        };

        let document = OfflineDocument {
            item_id: item.id.to_string(),
            local_path: local_path.clone(),
            metadata,
            artwork,
            cached_at: self.clock.now(),
        };

        match store.save(item.id.as_str(), document).await {
            Ok(()) => {
                info!("Item cached for offline playback");
                CacheOutcome::Cached {
                    item_id: item.id,
                    local_path,
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to persist offline document");
                CacheOutcome::Failed {
                    item_id: item.id,
                    message: err.to_string(),
                }
            }
        }
    }

    async fn download_artwork(&self, item: &PlayableItem) -> Option<StoredArtwork> {
        let http = self.http.as_ref()?;
        let url = item.remote_artwork_url()?;

        let request = HttpRequest::get(url)
            .header("Accept", "image/*")
            .timeout(ARTWORK_TIMEOUT);
        let response = match http.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = redact_url(url), error = %err, "Artwork fetch failed");
                return None;
            }
        };

        let mime_type = response.header("content-type").map(str::to_string);
        match response.into_success_body() {
            Ok(body) => {
                debug!(url = redact_url(url), bytes = body.len(), "Artwork fetched");
                Some(StoredArtwork {
                    mime_type,
                    data_base64: STANDARD.encode(&body),
                })
            }
            Err(err) => {
                warn!(url = redact_url(url), error = %err, "Artwork fetch failed");
                None
            }
        }
    }
}
