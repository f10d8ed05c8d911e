//! # Core Library
//!
//! Track model and the host-facing library capabilities the player consumes.
//!
//! ## Overview
//!
//! - [`Track`](models::Track) and [`TrackId`](models::TrackId), the immutable
//!   catalog items the queue is built from
//! - [`MediaCatalog`](catalog::MediaCatalog), the host's list of playable tracks
//! - [`ArtCache`](artwork::ArtCache), lookup of cached album art images
//! - [`FavoritesRepository`](favorites::FavoritesRepository) and
//!   [`PlaylistRepository`](playlists::PlaylistRepository), user track lists
//!   kept in the settings store

pub mod artwork;
pub mod catalog;
pub mod error;
pub mod favorites;
pub mod models;
pub mod playlists;

pub use artwork::{ArtCache, DirectoryArtCache};
pub use catalog::{decode_ids, encode_ids, resolve_ids, InMemoryCatalog, MediaCatalog, ResolvedTracks};
pub use error::{LibraryError, Result};
pub use favorites::{FavoritesRepository, SettingsFavoritesRepository};
pub use models::{Playlist, Track, TrackId};
pub use playlists::{PlaylistRepository, SettingsPlaylistRepository};
