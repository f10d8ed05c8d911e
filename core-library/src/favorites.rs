//! Favorite tracks
//!
//! Favorites are a list of track ids kept in the settings store under a
//! single key, oldest first. Ids are resolved against the catalog on read,
//! so a favorite whose file has gone away is left out rather than failing.

use crate::catalog::{decode_ids, encode_ids, resolve_ids, MediaCatalog};
use crate::error::Result;
use crate::models::{Track, TrackId};
use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Settings key holding the comma-separated favorite ids.
pub const FAVORITES_KEY: &str = "favorites";

/// The user's favorite tracks.
#[async_trait]
pub trait FavoritesRepository: Send + Sync {
    /// Mark a track as favorite.
    ///
    /// # Returns
    /// `false` if the track already was a favorite
    async fn add(&self, id: TrackId) -> Result<bool>;

    /// Unmark a track.
    ///
    /// # Returns
    /// `false` if the track was not a favorite
    async fn remove(&self, id: TrackId) -> Result<bool>;

    async fn contains(&self, id: TrackId) -> Result<bool>;

    /// Favorite ids in the order they were added.
    async fn ids(&self) -> Result<Vec<TrackId>>;

    /// Favorites that still resolve in `catalog`, in the order they were added.
    ///
    /// # Errors
    /// Returns an error if the store or the catalog cannot be read
    async fn tracks(&self, catalog: &dyn MediaCatalog) -> Result<Vec<Track>> {
        let ids = self.ids().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let available = catalog.list_tracks().await?;
        let resolved = resolve_ids(&available, &ids);
        if resolved.dropped > 0 {
            debug!(dropped = resolved.dropped, "Favorites no longer in the catalog");
        }
        Ok(resolved.tracks)
    }
}

/// [`FavoritesRepository`] persisted through a [`SettingsStore`].
pub struct SettingsFavoritesRepository {
    store: Arc<dyn SettingsStore>,
    // Serializes read-modify-write cycles on the single key.
    write_lock: Mutex<()>,
}

impl SettingsFavoritesRepository {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<TrackId>> {
        let raw = self
            .store
            .get_string(FAVORITES_KEY)
            .await?
            .unwrap_or_default();

        let (ids, malformed) = decode_ids(&raw);
        if malformed > 0 {
            warn!(malformed, "Skipping malformed favorite entries");
        }
        Ok(ids)
    }

    async fn save(&self, ids: &[TrackId]) -> Result<()> {
        self.store.set_string(FAVORITES_KEY, &encode_ids(ids)).await?;
        Ok(())
    }
}

#[async_trait]
impl FavoritesRepository for SettingsFavoritesRepository {
    async fn add(&self, id: TrackId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut ids = self.load().await?;
        if ids.contains(&id) {
            return Ok(false);
        }

        ids.push(id);
        self.save(&ids).await?;
        debug!(track_id = %id, "Added favorite");
        Ok(true)
    }

    async fn remove(&self, id: TrackId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut ids = self.load().await?;
        let before = ids.len();
        ids.retain(|existing| *existing != id);
        if ids.len() == before {
            return Ok(false);
        }

        self.save(&ids).await?;
        debug!(track_id = %id, "Removed favorite");
        Ok(true)
    }

    async fn contains(&self, id: TrackId) -> Result<bool> {
        Ok(self.load().await?.contains(&id))
    }

    async fn ids(&self) -> Result<Vec<TrackId>> {
        self.load().await
    }
}
