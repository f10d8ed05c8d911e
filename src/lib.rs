//! Workspace umbrella crate.
//!
//! Host applications can depend on `mpc-player` and pick the platform shims
//! through features instead of wiring each workspace crate individually.

pub use core_service::*;
