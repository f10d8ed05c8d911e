//! Session persistence.
//!
//! The engine hands a [`SessionSnapshot`] to the [`SessionWriter`] after every
//! state-affecting operation. Snapshots travel through a `watch` channel to a
//! single writer task, so a burst of saves collapses into one write of the
//! newest snapshot. At startup [`plan_restore`] reads the stored keys once and
//! resolves them against the live catalog.

use crate::error::Result;
use bridge_traits::playback::RepeatMode;
use bridge_traits::storage::SettingsStore;
use core_library::catalog::{decode_ids, encode_ids, resolve_ids, MediaCatalog};
use core_library::models::{Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Keys of the persisted session.
pub mod keys {
    /// Last known position in milliseconds.
    pub const CURRENT_TIME: &str = "current_time";
    /// Id of the current track, `-1` when the queue had no current track.
    pub const CURRENT_SONG: &str = "current_song";
    /// Comma-separated track ids in linear queue order.
    pub const CURRENT_PLAYLIST: &str = "current_playlist";
    /// Repeat mode ordinal.
    pub const REPEAT_MODE: &str = "repeat_mode";
    pub const SHUFFLE: &str = "shuffle";
}

const NO_TRACK: i64 = -1;

/// State written to the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current_track: Option<TrackId>,
    pub position: Duration,
    /// Queue ids in linear order.
    pub queue: Vec<TrackId>,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
}

/// Write one snapshot in a single transaction.
pub async fn write_snapshot(store: &dyn SettingsStore, snapshot: &SessionSnapshot) -> Result<()> {
    let mut tx = store.begin_transaction().await?;

    tx.set_i64(keys::CURRENT_TIME, snapshot.position.as_millis() as i64)
        .await?;
    tx.set_i64(
        keys::CURRENT_SONG,
        snapshot.current_track.map_or(NO_TRACK, TrackId::value),
    )
    .await?;
    if !snapshot.queue.is_empty() {
        tx.set_string(keys::CURRENT_PLAYLIST, &encode_ids(&snapshot.queue))
            .await?;
    }
    tx.set_i64(keys::REPEAT_MODE, snapshot.repeat_mode.ordinal())
        .await?;
    tx.set_bool(keys::SHUFFLE, snapshot.shuffle).await?;

    tx.commit().await?;
    Ok(())
}

/// Session as stored, before catalog resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub current_track: TrackId,
    pub position: Duration,
    pub queue: Vec<TrackId>,
    /// Playlist entries that were not integers.
    pub malformed: usize,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
}

/// Read the stored session, or `None` when nothing restorable was saved.
pub async fn read_session(store: &dyn SettingsStore) -> Result<Option<StoredSession>> {
    let current = store.get_i64(keys::CURRENT_SONG).await?.unwrap_or(NO_TRACK);
    if current < 0 {
        return Ok(None);
    }

    let raw_playlist = store
        .get_string(keys::CURRENT_PLAYLIST)
        .await?
        .unwrap_or_default();
    let (queue, malformed) = decode_ids(&raw_playlist);
    if queue.is_empty() {
        return Ok(None);
    }

    let position_ms = store.get_i64(keys::CURRENT_TIME).await?.unwrap_or(0).max(0);
    let repeat_mode = store
        .get_i64(keys::REPEAT_MODE)
        .await?
        .and_then(RepeatMode::from_ordinal)
        .unwrap_or_default();
    let shuffle = store.get_bool(keys::SHUFFLE).await?.unwrap_or(false);

    Ok(Some(StoredSession {
        current_track: TrackId(current),
        position: Duration::from_millis(position_ms as u64),
        queue,
        malformed,
        repeat_mode,
        shuffle,
    }))
}

/// Everything the engine needs to apply a restored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    /// Resolved queue in linear order.
    pub tracks: Vec<Track>,
    /// Linear index of the saved current track.
    pub start_index: usize,
    pub position: Duration,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    /// Stored entries that could not be used (unknown ids or malformed).
    pub dropped: usize,
}

impl RestorePlan {
    pub fn current_track_id(&self) -> Option<TrackId> {
        self.tracks.get(self.start_index).map(|track| track.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Ready(RestorePlan),
    Skipped(String),
}

/// Read the stored session and resolve it against the catalog.
#[instrument(skip_all)]
pub async fn plan_restore(
    store: &dyn SettingsStore,
    catalog: &dyn MediaCatalog,
) -> Result<RestoreOutcome> {
    let Some(stored) = read_session(store).await? else {
        return Ok(RestoreOutcome::Skipped("no saved session".to_string()));
    };

    let available = catalog.list_tracks().await?;
    let resolved = resolve_ids(&available, &stored.queue);
    let dropped = resolved.dropped + stored.malformed;

    if resolved.tracks.is_empty() {
        return Ok(RestoreOutcome::Skipped(
            "no saved track is in the catalog".to_string(),
        ));
    }

    let Some(start_index) = resolved
        .tracks
        .iter()
        .position(|track| track.id == stored.current_track)
    else {
        return Ok(RestoreOutcome::Skipped(format!(
            "saved track {} is no longer in the catalog",
            stored.current_track
        )));
    };

    debug!(
        queue_len = resolved.tracks.len(),
        dropped,
        track_id = %stored.current_track,
        "Resolved saved session"
    );

    Ok(RestoreOutcome::Ready(RestorePlan {
        tracks: resolved.tracks,
        start_index,
        position: stored.position,
        repeat_mode: stored.repeat_mode,
        shuffle: stored.shuffle,
        dropped,
    }))
}

/// Single background writer for session snapshots.
pub struct SessionWriter {
    sender: watch::Sender<Option<SessionSnapshot>>,
    task: JoinHandle<()>,
}

impl SessionWriter {
    pub fn spawn(store: Arc<dyn SettingsStore>, events: EventBus) -> Self {
        let (sender, mut receiver) = watch::channel::<Option<SessionSnapshot>>(None);

        let task = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let Some(snapshot) = receiver.borrow_and_update().clone() else {
                    continue;
                };

                if let Err(e) = write_snapshot(store.as_ref(), &snapshot).await {
                    warn!(error = %e, "Failed to save session");
                    events
                        .emit(CoreEvent::Session(SessionEvent::SaveFailed {
                            message: e.to_string(),
                        }))
                        .ok();
                }
            }
            debug!("Session writer finished");
        });

        Self { sender, task }
    }

    /// Queue a snapshot; only the newest unsaved one is written.
    pub fn save(&self, snapshot: SessionSnapshot) {
        self.sender.send_replace(Some(snapshot));
    }

    /// Write any pending snapshot and stop the writer.
    pub async fn close(self) {
        let Self { sender, task } = self;
        drop(sender);
        if let Err(e) = task.await {
            warn!(error = %e, "Session writer task failed");
        } else {
            info!("Session saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;
    use core_library::catalog::InMemoryCatalog;

    fn track(id: i64) -> Track {
        Track::new(id, format!("Track {id}"), format!("/music/{id}.mp3"))
    }

    fn snapshot(current: i64, queue: &[i64]) -> SessionSnapshot {
        SessionSnapshot {
            current_track: Some(TrackId(current)),
            position: Duration::from_millis(42_000),
            queue: queue.iter().copied().map(TrackId).collect(),
            repeat_mode: RepeatMode::One,
            shuffle: true,
        }
    }

    #[tokio::test]
    async fn snapshot_is_written_under_the_session_keys() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        write_snapshot(&store, &snapshot(7, &[5, 7])).await.unwrap();

        assert_eq!(store.get_i64(keys::CURRENT_TIME).await.unwrap(), Some(42_000));
        assert_eq!(store.get_i64(keys::CURRENT_SONG).await.unwrap(), Some(7));
        assert_eq!(
            store.get_string(keys::CURRENT_PLAYLIST).await.unwrap().as_deref(),
            Some("5,7")
        );
        assert_eq!(store.get_i64(keys::REPEAT_MODE).await.unwrap(), Some(1));
        assert_eq!(store.get_bool(keys::SHUFFLE).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn empty_queue_keeps_previous_playlist() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        write_snapshot(&store, &snapshot(7, &[5, 7])).await.unwrap();

        let cleared = SessionSnapshot {
            current_track: None,
            queue: Vec::new(),
            ..snapshot(7, &[])
        };
        write_snapshot(&store, &cleared).await.unwrap();

        assert_eq!(
            store.get_string(keys::CURRENT_PLAYLIST).await.unwrap().as_deref(),
            Some("5,7")
        );
        assert!(read_session(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_drops_unknown_ids() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        write_snapshot(&store, &snapshot(7, &[5, 99, 7])).await.unwrap();
        let catalog = InMemoryCatalog::new(vec![track(5), track(7), track(8)]);

        let RestoreOutcome::Ready(plan) = plan_restore(&store, &catalog).await.unwrap() else {
            panic!("expected a restorable session");
        };

        let ids: Vec<_> = plan.tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TrackId(5), TrackId(7)]);
        assert_eq!(plan.start_index, 1);
        assert_eq!(plan.dropped, 1);
        assert_eq!(plan.position, Duration::from_secs(42));
        assert_eq!(plan.repeat_mode, RepeatMode::One);
        assert!(plan.shuffle);
    }

    #[tokio::test]
    async fn missing_optional_keys_fall_back_to_defaults() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_i64(keys::CURRENT_SONG, 5).await.unwrap();
        store.set_string(keys::CURRENT_PLAYLIST, "5").await.unwrap();
        store.set_i64(keys::REPEAT_MODE, 9).await.unwrap();

        let stored = read_session(&store).await.unwrap().unwrap();
        assert_eq!(stored.repeat_mode, RepeatMode::All);
        assert!(!stored.shuffle);
        assert_eq!(stored.position, Duration::ZERO);
    }

    #[tokio::test]
    async fn restore_is_skipped_when_current_track_vanished() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        write_snapshot(&store, &snapshot(99, &[5, 99])).await.unwrap();
        let catalog = InMemoryCatalog::new(vec![track(5)]);

        let outcome = plan_restore(&store, &catalog).await.unwrap();
        assert!(matches!(outcome, RestoreOutcome::Skipped(reason) if reason.contains("99")));
    }

    #[tokio::test]
    async fn restore_is_skipped_without_saved_session() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        let catalog = InMemoryCatalog::new(vec![track(5)]);

        let outcome = plan_restore(&store, &catalog).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Skipped("no saved session".to_string()));
    }

    #[tokio::test]
    async fn writer_persists_latest_snapshot_on_close() {
        let store = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
        let writer = SessionWriter::spawn(store.clone(), EventBus::new(8));

        writer.save(snapshot(5, &[5, 7]));
        writer.save(snapshot(7, &[5, 7]));
        writer.close().await;

        assert_eq!(store.get_i64(keys::CURRENT_SONG).await.unwrap(), Some(7));
    }
}
