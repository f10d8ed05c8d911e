//! # Playback Error Types

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

/// Errors surfaced by the playback crate.
///
/// Only [`PlaybackError::EngineStopped`] and
/// [`PlaybackError::UnknownCommand`] ever reach a [`PlayerHandle`] caller;
/// the other variants stay inside the engine and its background tasks, where
/// they are logged and turned into events.
///
/// [`PlayerHandle`]: crate::PlayerHandle
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The engine task has ended; the handle can no longer be used.
    #[error("Playback engine is not running")]
    EngineStopped,

    /// A host media action did not match any known command.
    #[error("Unknown media command: {0}")]
    UnknownCommand(String),

    /// Audio output, focus or settings bridge failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Catalog lookup failed.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
