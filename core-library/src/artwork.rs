//! Album art lookup
//!
//! Art is extracted by the host and cached as image files; the core only
//! needs to know where the image for a track lives, if anywhere.

use crate::error::Result;
use crate::models::TrackId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of cached album art images.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtCache: Send + Sync {
    /// Path of the cached art image for a track.
    ///
    /// # Arguments
    /// * `locator` - Location of the track's audio file
    /// * `id` - Catalog id of the track
    ///
    /// # Returns
    /// `None` when the track has no embedded or cached art
    async fn lookup(&self, locator: &Path, id: TrackId) -> Result<Option<PathBuf>>;
}

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "png", "webp"];

/// Art cache backed by a directory of `{track_id}.{ext}` files.
#[derive(Debug, Clone)]
pub struct DirectoryArtCache {
    root: PathBuf,
}

impl DirectoryArtCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, id: TrackId) -> impl Iterator<Item = PathBuf> + '_ {
        IMAGE_EXTENSIONS
            .iter()
            .map(move |ext| self.root.join(format!("{id}.{ext}")))
    }
}

#[async_trait]
impl ArtCache for DirectoryArtCache {
    async fn lookup(&self, _locator: &Path, id: TrackId) -> Result<Option<PathBuf>> {
        for candidate in self.candidates(id) {
            if tokio::fs::try_exists(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        debug!(track_id = %id, root = %self.root.display(), "No cached art");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mpc-art-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_cached_image_by_track_id() {
        let dir = scratch_dir("hit");
        std::fs::write(dir.join("12.png"), b"png").unwrap();

        let cache = DirectoryArtCache::new(&dir);
        let found = cache.lookup(Path::new("/music/a.mp3"), TrackId(12)).await.unwrap();
        assert_eq!(found, Some(dir.join("12.png")));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn missing_art_is_none() {
        let dir = scratch_dir("miss");
        let cache = DirectoryArtCache::new(&dir);

        let found = cache.lookup(Path::new("/music/a.mp3"), TrackId(1)).await.unwrap();
        assert!(found.is_none());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
