//! User playlists
//!
//! Each playlist is stored under its own settings key, `playlist.<title>`,
//! as comma-separated track ids. Titles are unique and trimmed before use.

use crate::catalog::{decode_ids, encode_ids, resolve_ids, MediaCatalog};
use crate::error::{LibraryError, Result};
use crate::models::{Playlist, Track};
use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Prefix of the settings keys holding playlists.
pub const PLAYLIST_KEY_PREFIX: &str = "playlist.";

/// Named track lists kept across restarts.
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Store `playlist`, replacing any playlist with the same title.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the title is blank
    async fn update(&self, playlist: &Playlist) -> Result<()>;

    /// # Returns
    /// `false` if no playlist has this title
    async fn remove(&self, title: &str) -> Result<bool>;

    async fn exists(&self, title: &str) -> Result<bool>;

    /// Move a playlist to a new title, keeping its tracks.
    ///
    /// # Returns
    /// `false` if no playlist has `title`
    ///
    /// # Errors
    /// Returns `InvalidInput` if `new_title` is blank or already taken
    async fn rename(&self, title: &str, new_title: &str) -> Result<bool>;

    async fn find(&self, title: &str) -> Result<Option<Playlist>>;

    /// Every playlist, ordered by title.
    async fn list(&self) -> Result<Vec<Playlist>>;

    /// Tracks of a playlist that still resolve in `catalog`.
    ///
    /// # Returns
    /// `None` if no playlist has this title
    async fn tracks(&self, title: &str, catalog: &dyn MediaCatalog) -> Result<Option<Vec<Track>>> {
        let Some(playlist) = self.find(title).await? else {
            return Ok(None);
        };
        if playlist.track_ids.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let available = catalog.list_tracks().await?;
        let resolved = resolve_ids(&available, &playlist.track_ids);
        if resolved.dropped > 0 {
            debug!(
                title = %playlist.title,
                dropped = resolved.dropped,
                "Playlist tracks no longer in the catalog"
            );
        }
        Ok(Some(resolved.tracks))
    }
}

/// [`PlaylistRepository`] persisted through a [`SettingsStore`].
pub struct SettingsPlaylistRepository {
    store: Arc<dyn SettingsStore>,
    write_lock: Mutex<()>,
}

fn key_for(title: &str) -> String {
    format!("{}{}", PLAYLIST_KEY_PREFIX, title.trim())
}

fn checked_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "title".to_string(),
            message: "Playlist title cannot be empty".to_string(),
        });
    }
    Ok(title)
}

impl SettingsPlaylistRepository {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self, title: &str) -> Result<Option<Playlist>> {
        let title = title.trim();
        let Some(raw) = self.store.get_string(&key_for(title)).await? else {
            return Ok(None);
        };

        let (track_ids, malformed) = decode_ids(&raw);
        if malformed > 0 {
            warn!(title, malformed, "Skipping malformed playlist entries");
        }
        Ok(Some(Playlist::new(title, track_ids)))
    }
}

#[async_trait]
impl PlaylistRepository for SettingsPlaylistRepository {
    async fn update(&self, playlist: &Playlist) -> Result<()> {
        playlist.validate()?;
        let _guard = self.write_lock.lock().await;

        self.store
            .set_string(&key_for(&playlist.title), &encode_ids(&playlist.track_ids))
            .await?;
        debug!(title = %playlist.title.trim(), tracks = playlist.track_ids.len(), "Saved playlist");
        Ok(())
    }

    async fn remove(&self, title: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = key_for(title);
        if !self.store.has_key(&key).await? {
            return Ok(false);
        }

        self.store.delete(&key).await?;
        debug!(title = %title.trim(), "Removed playlist");
        Ok(true)
    }

    async fn exists(&self, title: &str) -> Result<bool> {
        Ok(self.store.has_key(&key_for(title)).await?)
    }

    async fn rename(&self, title: &str, new_title: &str) -> Result<bool> {
        let new_title = checked_title(new_title)?;
        let _guard = self.write_lock.lock().await;

        let Some(playlist) = self.load(title).await? else {
            return Ok(false);
        };
        if playlist.title == new_title {
            return Ok(true);
        }
        if self.store.has_key(&key_for(new_title)).await? {
            return Err(LibraryError::InvalidInput {
                field: "title".to_string(),
                message: format!("A playlist named '{}' already exists", new_title),
            });
        }

        let mut tx = self.store.begin_transaction().await?;
        tx.set_string(&key_for(new_title), &encode_ids(&playlist.track_ids))
            .await?;
        tx.delete(&key_for(&playlist.title)).await?;
        tx.commit().await?;

        debug!(from = %playlist.title, to = new_title, "Renamed playlist");
        Ok(true)
    }

    async fn find(&self, title: &str) -> Result<Option<Playlist>> {
        self.load(title).await
    }

    async fn list(&self) -> Result<Vec<Playlist>> {
        let keys = self.store.list_keys().await?;

        let mut playlists = Vec::new();
        for title in keys.iter().filter_map(|key| key.strip_prefix(PLAYLIST_KEY_PREFIX)) {
            if let Some(playlist) = self.load(title).await? {
                playlists.push(playlist);
            }
        }
        playlists.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(playlists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::TrackId;
    use bridge_desktop::SqliteSettingsStore;

    fn ids(raw: &[i64]) -> Vec<TrackId> {
        raw.iter().copied().map(TrackId).collect()
    }

    async fn repository() -> (SettingsPlaylistRepository, Arc<dyn SettingsStore>) {
        let store: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
        (SettingsPlaylistRepository::new(store.clone()), store)
    }

    #[tokio::test]
    async fn update_replaces_by_title() {
        let (playlists, _store) = repository().await;

        playlists.update(&Playlist::new("Road", ids(&[1, 2]))).await.unwrap();
        playlists.update(&Playlist::new(" Road ", ids(&[3]))).await.unwrap();
        playlists.update(&Playlist::new("Morning", ids(&[]))).await.unwrap();

        let all = playlists.list().await.unwrap();
        assert_eq!(
            all,
            vec![
                Playlist::new("Morning", Vec::new()),
                Playlist::new("Road", ids(&[3])),
            ]
        );
    }

    #[tokio::test]
    async fn blank_titles_are_rejected() {
        let (playlists, _store) = repository().await;

        let err = playlists.update(&Playlist::new("  ", ids(&[1]))).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
        assert!(playlists.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_moves_tracks_and_refuses_taken_titles() {
        let (playlists, store) = repository().await;
        playlists.update(&Playlist::new("Old", ids(&[5, 6]))).await.unwrap();
        playlists.update(&Playlist::new("Other", ids(&[7]))).await.unwrap();

        assert!(playlists.rename("Old", "New").await.unwrap());
        assert!(!playlists.exists("Old").await.unwrap());
        assert_eq!(
            playlists.find("New").await.unwrap(),
            Some(Playlist::new("New", ids(&[5, 6])))
        );
        assert!(!store.has_key("playlist.Old").await.unwrap());

        assert!(!playlists.rename("Missing", "Anything").await.unwrap());
        let err = playlists.rename("New", "Other").await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
        assert_eq!(
            playlists.find("Other").await.unwrap(),
            Some(Playlist::new("Other", ids(&[7])))
        );
    }

    #[tokio::test]
    async fn remove_reports_whether_anything_was_deleted() {
        let (playlists, _store) = repository().await;
        playlists.update(&Playlist::new("Gym", ids(&[1]))).await.unwrap();

        assert!(playlists.remove("Gym").await.unwrap());
        assert!(!playlists.remove("Gym").await.unwrap());
        assert!(playlists.find("Gym").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tracks_drop_ids_missing_from_the_catalog() {
        let (playlists, store) = repository().await;
        store.set_string("volume", "7").await.unwrap();
        playlists.update(&Playlist::new("Mix", ids(&[3, 8, 1]))).await.unwrap();

        let catalog = InMemoryCatalog::new(vec![
            Track::new(1, "One", "/music/1.mp3"),
            Track::new(3, "Three", "/music/3.mp3"),
        ]);
        let tracks = playlists.tracks("Mix", &catalog).await.unwrap().unwrap();
        let resolved: Vec<TrackId> = tracks.iter().map(|t| t.id).collect();
        assert_eq!(resolved, ids(&[3, 1]));

        assert!(playlists.tracks("Nope", &catalog).await.unwrap().is_none());
        assert_eq!(playlists.list().await.unwrap().len(), 1);
    }
}
