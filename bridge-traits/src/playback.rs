//! Audio output bridge and the playback vocabulary shared with hosts.
//!
//! An [`AudioOutput`] is the single audio-rendering resource the playback
//! engine drives. Loading is asynchronous: [`AudioOutput::load`] returns as
//! soon as the request is accepted and the outcome arrives later on the
//! output's event stream, tagged with the [`PlaybackToken`] of the request.
//! Hosts map this onto their native player (MediaPlayer, AVPlayer, a desktop
//! decoder thread, ...).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;

/// Engine status as published to presenters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// No resource prepared.
    #[default]
    Idle,
    /// Resource is loading a track.
    Preparing,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Preparing => "preparing",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Auto-advance policy applied when a track finishes on its own.
///
/// The ordinal values are part of the persisted session format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    None,
    One,
    #[default]
    All,
}

impl RepeatMode {
    const ORDER: [RepeatMode; 3] = [RepeatMode::None, RepeatMode::One, RepeatMode::All];

    pub fn ordinal(self) -> i64 {
        match self {
            RepeatMode::None => 0,
            RepeatMode::One => 1,
            RepeatMode::All => 2,
        }
    }

    pub fn from_ordinal(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ORDER.get(index).copied())
    }

    /// Next mode in ordinal order, wrapping back to `None` after `All`.
    pub fn cycled(self) -> Self {
        let next = (self.ordinal() as usize + 1) % Self::ORDER.len();
        Self::ORDER[next]
    }
}

/// Generation tag attached to every load request.
///
/// Events carrying a token other than the engine's current one belong to a
/// resource that has since been replaced and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PlaybackToken(u64);

impl PlaybackToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for PlaybackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the bytes of a track live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
}

impl AudioSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioSource::LocalFile { path: path.into() }
    }
}

/// Request to load a source into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub token: PlaybackToken,
    pub source: AudioSource,
}

impl LoadRequest {
    pub fn new(token: PlaybackToken, source: AudioSource) -> Self {
        Self { token, source }
    }
}

/// Asynchronous notifications emitted by an [`AudioOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The source is ready; `duration` is `None` when the container does not report one.
    Prepared {
        token: PlaybackToken,
        duration: Option<Duration>,
    },
    /// The source could not be opened or decoded.
    PrepareFailed {
        token: PlaybackToken,
        message: String,
    },
    /// Rendering reached the end of the track.
    Completed { token: PlaybackToken },
    /// Rendering stopped because of an error after preparation succeeded.
    Failed {
        token: PlaybackToken,
        message: String,
    },
}

impl OutputEvent {
    pub fn token(&self) -> PlaybackToken {
        match self {
            OutputEvent::Prepared { token, .. }
            | OutputEvent::PrepareFailed { token, .. }
            | OutputEvent::Completed { token }
            | OutputEvent::Failed { token, .. } => *token,
        }
    }
}

/// The audio-rendering resource.
///
/// Implementations hold at most one loaded source. Loading a new source
/// implicitly releases the previous one. Control calls made while nothing is
/// prepared return [`BridgeError::NothingLoaded`](crate::error::BridgeError::NothingLoaded).
#[async_trait::async_trait]
pub trait AudioOutput: Send + Sync {
    /// Start loading a source. Returns once the request is accepted; the
    /// outcome is reported as [`OutputEvent::Prepared`] or
    /// [`OutputEvent::PrepareFailed`] carrying `request.token`.
    async fn load(&self, request: LoadRequest) -> Result<()>;

    /// Begin or resume rendering.
    async fn start(&self) -> Result<()>;

    /// Pause rendering, keeping the loaded source and position.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Current rendering position.
    async fn position(&self) -> Result<Duration>;

    /// Drop the loaded source and any native resources behind it.
    async fn release(&self) -> Result<()>;

    /// Subscribe to preparation and completion events.
    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_mode_ordinals_round_trip() {
        for mode in [RepeatMode::None, RepeatMode::One, RepeatMode::All] {
            assert_eq!(RepeatMode::from_ordinal(mode.ordinal()), Some(mode));
        }
        assert_eq!(RepeatMode::from_ordinal(3), None);
        assert_eq!(RepeatMode::from_ordinal(-1), None);
    }

    #[test]
    fn repeat_mode_cycles_in_ordinal_order() {
        assert_eq!(RepeatMode::None.cycled(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycled(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycled(), RepeatMode::None);
    }

    #[test]
    fn repeat_mode_defaults_to_all() {
        assert_eq!(RepeatMode::default(), RepeatMode::All);
        assert_eq!(PlaybackStatus::default(), PlaybackStatus::Idle);
    }

    #[test]
    fn token_advances() {
        let token = PlaybackToken::default();
        assert_eq!(token.next().value(), 1);
        assert_ne!(token, token.next());
    }

    #[test]
    fn output_event_exposes_token() {
        let token = PlaybackToken::new(7);
        let event = OutputEvent::PrepareFailed {
            token,
            message: "bad header".to_string(),
        };
        assert_eq!(event.token(), token);
        assert_eq!(OutputEvent::Completed { token }.token(), token);
    }
}
