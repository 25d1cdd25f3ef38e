//! Playable items.
//!
//! An item is what the queue holds and what the orchestrator hands to the
//! media engine. Duration and part of the display metadata are only known
//! once the engine has loaded the item, so they are filled in lazily.

use bridge_traits::{AudioSource, PlaybackMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stable identity of a playable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A track the player can load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub id: ItemId,
    /// Remote stream locator.
    pub url: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Remote URL or local path of the cover image.
    pub artwork_url: Option<String>,
    /// Request headers for the stream (auth, range hints).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Set once a downloaded copy has been persisted.
    #[serde(default)]
    pub is_offline: bool,
    pub local_path: Option<PathBuf>,
    pub duration: Option<Duration>,
}

impl PlayableItem {
    pub fn new(id: impl Into<ItemId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            artist: None,
            album: None,
            artwork_url: None,
            headers: HashMap::new(),
            is_offline: false,
            local_path: None,
            duration: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_artwork_url(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Mark the item as available from a local copy.
    pub fn with_local_copy(mut self, path: impl Into<PathBuf>) -> Self {
        self.mark_offline(path);
        self
    }

    pub fn mark_offline(&mut self, path: impl Into<PathBuf>) {
        self.is_offline = true;
        self.local_path = Some(path.into());
    }

    /// Where the engine should load this item from.
    ///
    /// Offline items with a local copy never touch the network.
    pub fn source(&self) -> AudioSource {
        match (self.is_offline, self.local_path.as_deref()) {
            (true, Some(path)) => AudioSource::LocalFile {
                path: path.to_path_buf(),
            },
            _ => AudioSource::RemoteStream {
                url: self.url.clone(),
                headers: self.headers.clone(),
            },
        }
    }

    /// Whether loading this item requires reachability.
    pub fn needs_network(&self) -> bool {
        self.source().is_remote()
    }

    pub fn metadata(&self) -> PlaybackMetadata {
        PlaybackMetadata {
            track_id: Some(self.id.to_string()),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            artwork: self.artwork_url.clone(),
        }
    }

    /// Fold engine-reported metadata into the item.
    ///
    /// Only fields the engine actually reported overwrite existing values.
    /// Returns whether anything changed.
    pub fn merge_metadata(&mut self, update: &PlaybackMetadata) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.title, &update.title),
            (&mut self.artist, &update.artist),
            (&mut self.album, &update.album),
            (&mut self.artwork_url, &update.artwork),
        ] {
            if value.is_some() && slot != value {
                *slot = value.clone();
                changed = true;
            }
        }
        changed
    }

    /// Artwork URL when it points at a remote resource.
    pub fn remote_artwork_url(&self) -> Option<&str> {
        self.artwork_url
            .as_deref()
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
    }

    pub fn has_local_extension(path: &Path) -> bool {
        path.extension().map(|ext| !ext.is_empty()).unwrap_or(false)
    }
}
