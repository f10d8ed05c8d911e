//! Domain models for the music library
//!
//! Tracks arrive fully formed from the media catalog and are never mutated
//! by the core afterwards.

use crate::error::{LibraryError, Result};
use bridge_traits::playback::AudioSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// ID Types
// =============================================================================

/// Stable catalog identifier of a track.
///
/// Ids survive restarts, which is what lets a persisted queue be resolved
/// against a freshly scanned catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl TrackId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for TrackId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Playable audio item with its display metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub artist_id: Option<i64>,
    pub album: String,
    pub album_id: Option<i64>,
    /// Position on the album
    pub track_number: Option<u32>,
    /// Local path of the audio file
    pub locator: PathBuf,
}

impl Track {
    pub fn new(id: i64, title: impl Into<String>, locator: impl Into<PathBuf>) -> Self {
        Self {
            id: TrackId(id),
            title: title.into(),
            artist: String::new(),
            artist_id: None,
            album: String::new(),
            album_id: None,
            track_number: None,
            locator: locator.into(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>, artist_id: Option<i64>) -> Self {
        self.artist = artist.into();
        self.artist_id = artist_id;
        self
    }

    pub fn with_album(mut self, album: impl Into<String>, album_id: Option<i64>) -> Self {
        self.album = album.into();
        self.album_id = album_id;
        self
    }

    pub fn with_track_number(mut self, track_number: u32) -> Self {
        self.track_number = Some(track_number);
        self
    }

    /// Source handed to the audio output.
    pub fn source(&self) -> AudioSource {
        AudioSource::local(self.locator.clone())
    }

    pub fn locator(&self) -> &Path {
        &self.locator
    }

    /// `"{artist} - {album}"`, dropping whichever half is empty.
    pub fn subtitle(&self) -> String {
        match (self.artist.is_empty(), self.album.is_empty()) {
            (false, false) => format!("{} - {}", self.artist, self.album),
            (false, true) => self.artist.clone(),
            (true, false) => self.album.clone(),
            (true, true) => String::new(),
        }
    }

    /// Validate track data
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(invalid("title", "Track title cannot be empty"));
        }

        if self.locator.as_os_str().is_empty() {
            return Err(invalid("locator", "Track locator cannot be empty"));
        }

        if let Some(0) = self.track_number {
            return Err(invalid("track_number", "Track number must be positive"));
        }

        Ok(())
    }
}

/// Named, user-ordered list of track ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub title: String,
    pub track_ids: Vec<TrackId>,
}

impl Playlist {
    pub fn new(title: impl Into<String>, track_ids: Vec<TrackId>) -> Self {
        Self {
            title: title.into(),
            track_ids,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(invalid("title", "Playlist title cannot be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_id_parses_with_whitespace() {
        assert_eq!(" 42".parse::<TrackId>().unwrap(), TrackId(42));
        assert!("x".parse::<TrackId>().is_err());
    }

    #[test]
    fn subtitle_joins_artist_and_album() {
        let track = Track::new(1, "Song", "/music/song.mp3")
            .with_artist("Artist", Some(3))
            .with_album("Album", Some(9));
        assert_eq!(track.subtitle(), "Artist - Album");

        let bare = Track::new(2, "Song", "/music/song.mp3").with_artist("Artist", None);
        assert_eq!(bare.subtitle(), "Artist");
    }

    #[test]
    fn validate_rejects_missing_fields() {
        assert!(Track::new(1, " ", "/a.mp3").validate().is_err());
        assert!(Track::new(1, "Song", "").validate().is_err());
        assert!(Track::new(1, "Song", "/a.mp3")
            .with_track_number(0)
            .validate()
            .is_err());
        assert!(Track::new(1, "Song", "/a.mp3").validate().is_ok());
    }

    #[test]
    fn source_points_at_locator() {
        let track = Track::new(5, "Song", "/music/song.flac");
        assert_eq!(track.source(), AudioSource::local("/music/song.flac"));
    }

    #[test]
    fn track_id_serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&TrackId(7)).unwrap(), "7");
    }
}
