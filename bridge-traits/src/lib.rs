//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform
//! (desktop, Android, iOS).
//!
//! ## Traits
//!
//! ### Audio
//! - [`AudioOutput`](playback::AudioOutput) - The single audio-rendering resource
//! - [`AudioFocusProvider`](focus::AudioFocusProvider) - Device audio focus arbitration
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value map for session state
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let output = builder.audio_output
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "AudioOutput".to_string(),
//!         message: "No audio output provided. \
//!                  Desktop: enable the 'desktop-shims' feature. \
//!                  Mobile: inject the platform player adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be driven from async
//! tasks on a multi-threaded runtime.

pub mod error;
pub mod focus;
pub mod logging;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use focus::{AudioFocusProvider, FocusChange, FocusGrant};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AudioOutput, AudioSource, LoadRequest, OutputEvent, PlaybackStatus, PlaybackToken,
    RepeatMode,
};
pub use storage::{SettingsStore, SettingsTransaction};
