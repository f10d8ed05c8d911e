//! Now-playing card for notification and lock-screen presenters.

use core_library::artwork::ArtCache;
use core_library::models::TrackId;
use core_playback::{MediaCommand, PlayerState};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Button on the now-playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationAction {
    Previous,
    Play,
    Pause,
    Next,
    Close,
}

impl NotificationAction {
    /// Command to dispatch when the button is pressed.
    pub fn command(self) -> MediaCommand {
        match self {
            NotificationAction::Previous => MediaCommand::SkipPrevious,
            NotificationAction::Play => MediaCommand::Play,
            NotificationAction::Pause => MediaCommand::Pause,
            NotificationAction::Next => MediaCommand::SkipNext,
            NotificationAction::Close => MediaCommand::Close,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub track_id: TrackId,
    pub title: String,
    /// `"{artist} - {album}"`
    pub subtitle: String,
    pub artwork: Option<PathBuf>,
    pub duration_ms: Option<u64>,
    pub position_ms: u64,
    pub is_playing: bool,
    /// Previous, Play or Pause, Next, Close.
    pub actions: [NotificationAction; 4],
}

impl NowPlaying {
    /// Build the card for `state`, or `None` when nothing is queued.
    ///
    /// Art lookup failures leave the card without artwork.
    pub async fn from_state(state: &PlayerState, art_cache: Option<&dyn ArtCache>) -> Option<Self> {
        let track = state.current_track.as_ref()?;

        let artwork = match art_cache {
            Some(cache) => match cache.lookup(track.locator(), track.id).await {
                Ok(path) => path,
                Err(e) => {
                    debug!(track_id = %track.id, error = %e, "No artwork for now-playing card");
                    None
                }
            },
            None => None,
        };

        let is_playing = state.is_playing();
        let toggle = if is_playing {
            NotificationAction::Pause
        } else {
            NotificationAction::Play
        };

        Some(Self {
            track_id: track.id,
            title: track.title.clone(),
            subtitle: track.subtitle(),
            artwork,
            duration_ms: state.duration_ms,
            position_ms: state.position_ms,
            is_playing,
            actions: [
                NotificationAction::Previous,
                toggle,
                NotificationAction::Next,
                NotificationAction::Close,
            ],
        })
    }
}
