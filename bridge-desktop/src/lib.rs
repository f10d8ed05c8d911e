//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `AudioFocusProvider` using an in-process holder stack
//! - `AudioOutput` rendering headlessly against the runtime clock after
//!   validating sources with Symphonia
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FocusKind, HeadlessOutput, LocalFocusArbiter, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = SqliteSettingsStore::new("./settings.db".into()).await.unwrap();
//!     let arbiter = LocalFocusArbiter::new();
//!     let focus = arbiter.client(FocusKind::Permanent);
//!     let output = HeadlessOutput::new();
//!
//!     // Hand these to the core configuration
//! }
//! ```

mod focus;
mod output;
mod settings;

pub use focus::{FocusKind, LocalFocusArbiter, LocalFocusClient};
pub use output::{probe_duration, HeadlessOutput, Prober};
pub use settings::SqliteSettingsStore;
