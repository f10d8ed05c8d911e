//! # Playback Engine
//!
//! Queue-driven playback of local tracks on top of the bridge capabilities.
//!
//! ## Overview
//!
//! This crate handles:
//! - The playback state machine (`Idle`, `Preparing`, `Paused`, `Playing`)
//! - The play queue with linear and shuffled orders and repeat policies
//! - Audio focus negotiation and transient-interruption resume
//! - Position ticks while playing
//! - Saving the session after every change and restoring it on start
//! - Host media commands (notification and headset buttons)
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{EngineParts, PlaybackEngine, PlayerConfig};
//!
//! let (player, task) = PlaybackEngine::spawn(EngineParts {
//!     output,
//!     focus,
//!     settings,
//!     catalog,
//!     events: event_bus.clone(),
//!     config: PlayerConfig::default(),
//! });
//!
//! player.restore().await?;
//! player.load_queue(tracks, 0).await?;
//! player.play().await?;
//! ```

pub mod command;
pub mod engine;
pub mod error;
pub mod focus;
pub mod handle;
pub mod queue;
pub mod session;
pub mod ticker;

pub use command::{CommandOutcome, MediaCommand, RejectReason};
pub use core_runtime::config::PlayerConfig;
pub use core_runtime::events::PlayerState;
pub use engine::{EngineParts, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use handle::PlayerHandle;
pub use queue::PlayQueue;
pub use session::{RestoreOutcome, RestorePlan, SessionSnapshot};
