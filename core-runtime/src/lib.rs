//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the player crates:
//! - Logging and tracing bootstrap
//! - Configuration and capability injection
//! - Event bus carrying engine state to presenters
//!
//! ## Overview
//!
//! Everything here is independent of playback semantics. The playback engine
//! publishes through [`events::EventBus`], reads its tuning from
//! [`config::PlayerConfig`] and receives its host capabilities through
//! [`config::CoreConfig`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
