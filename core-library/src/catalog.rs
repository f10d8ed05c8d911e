//! Media catalog access
//!
//! The catalog is owned by the host (a MediaStore query, a scanned folder,
//! a database); the core only ever asks for the current list of tracks.

use crate::error::Result;
use crate::models::{Track, TrackId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read access to the tracks available on the device.
///
/// Implementations must be cheap to call repeatedly; the core queries the
/// catalog once at startup to resolve the persisted queue and whenever a
/// presenter asks for the library.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Every track currently known to the catalog.
    ///
    /// # Returns
    /// Tracks in the catalog's natural order
    ///
    /// # Errors
    /// Returns an error if the underlying index cannot be read
    async fn list_tracks(&self) -> Result<Vec<Track>>;
}

/// Outcome of mapping persisted ids back onto catalog tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTracks {
    /// Resolved tracks in the order of the requested ids.
    pub tracks: Vec<Track>,
    /// Number of ids the catalog no longer knows about.
    pub dropped: usize,
}

/// Join ids into the comma-separated form used by persisted lists.
pub fn encode_ids(ids: &[TrackId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a persisted id list, returning the ids and the number of malformed entries.
pub fn decode_ids(raw: &str) -> (Vec<TrackId>, usize) {
    let mut malformed = 0;
    let ids = raw
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.parse::<TrackId>() {
            Ok(id) => Some(id),
            Err(_) => {
                malformed += 1;
                None
            }
        })
        .collect();
    (ids, malformed)
}

/// Resolve `ids` against `catalog`, keeping the id order and duplicates.
pub fn resolve_ids(catalog: &[Track], ids: &[TrackId]) -> ResolvedTracks {
    let by_id: HashMap<TrackId, &Track> = catalog.iter().map(|track| (track.id, track)).collect();

    let mut resolved = ResolvedTracks::default();
    for id in ids {
        match by_id.get(id) {
            Some(track) => resolved.tracks.push((*track).clone()),
            None => resolved.dropped += 1,
        }
    }
    resolved
}

/// Catalog held entirely in memory.
///
/// Useful for hosts that index media themselves and for tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    tracks: RwLock<Vec<Track>>,
}

impl InMemoryCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: RwLock::new(tracks),
        }
    }

    /// Replace the catalog contents after a rescan.
    pub fn replace(&self, tracks: Vec<Track>) {
        *self.tracks.write() = tracks;
    }

    /// Remove a track, returning it when it was present.
    pub fn remove(&self, id: TrackId) -> Option<Track> {
        let mut tracks = self.tracks.write();
        let index = tracks.iter().position(|track| track.id == id)?;
        Some(tracks.remove(index))
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }
}

#[async_trait]
impl MediaCatalog for InMemoryCatalog {
    async fn list_tracks(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.read().clone())
    }
}
