//! # Core Configuration Module
//!
//! Builder-based configuration holding every capability the player core needs.
//!
//! ## Required Dependencies
//!
//! - `AudioOutput` - The audio-rendering resource
//! - `AudioFocusProvider` - Device audio focus
//! - `SettingsStore` - Durable storage for the listening session
//! - `MediaCatalog` - Tracks available on the device
//!
//! ## Optional Dependencies
//!
//! - `ArtCache` - Album art for the now-playing card
//! - `LoggerSink` - Host log forwarding
//!
//! When the `desktop-shims` feature is enabled, the `bridge-desktop`
//! implementations are injected for a missing `AudioOutput`,
//! `AudioFocusProvider` or `SettingsStore`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlayerConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .audio_output(Box::new(MyOutput::new()))
//!     .focus_provider(Arc::new(MyFocus::new()))
//!     .settings_store(Arc::new(MySettings::new()))
//!     .catalog(Arc::new(MyCatalog::new()))
//!     .player(PlayerConfig::default().with_skip_unplayable(false))
//!     .build()
//!     .await?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioFocusProvider, AudioOutput, LoggerSink, SettingsStore};
use core_library::{ArtCache, MediaCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const MIN_TICK_INTERVAL_MS: u64 = 10;
const MAX_TICK_INTERVAL_MS: u64 = 5_000;

/// Tuning knobs of the playback engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Period of the position clock while playing (milliseconds)
    pub tick_interval_ms: u64,
    /// Capacity of the engine command channel
    pub command_buffer: usize,
    /// Move on to the next track when preparation fails
    pub skip_unplayable: bool,
    /// Save the session and restore it at startup
    pub persist_session: bool,
    /// Fixed seed for shuffle permutations; random when unset
    pub shuffle_seed: Option<u64>,
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_command_buffer() -> usize {
    64
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            command_buffer: default_command_buffer(),
            skip_unplayable: true,
            persist_session: true,
            shuffle_seed: None,
        }
    }
}

impl PlayerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    pub fn with_skip_unplayable(mut self, skip: bool) -> Self {
        self.skip_unplayable = skip;
        self
    }

    pub fn with_persist_session(mut self, persist: bool) -> Self {
        self.persist_session = persist;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            return Err(Error::Config(format!(
                "Tick interval must be between {}ms and {}ms, got {}ms",
                MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS, self.tick_interval_ms
            )));
        }

        if self.command_buffer == 0 {
            return Err(Error::Config(
                "Command buffer must hold at least one command".to_string(),
            ));
        }

        Ok(())
    }
}

/// Everything needed to start the player core.
///
/// Not `Clone`: the audio output is handed to the engine, which becomes its
/// only owner.
pub struct CoreConfig {
    pub audio_output: Box<dyn AudioOutput>,
    pub focus_provider: Arc<dyn AudioFocusProvider>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub catalog: Arc<dyn MediaCatalog>,
    pub art_cache: Option<Arc<dyn ArtCache>>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Per-subscriber backlog of the event bus
    pub event_buffer_size: usize,
    pub player: PlayerConfig,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("audio_output", &"AudioOutput { ... }")
            .field("focus_provider", &"AudioFocusProvider { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("catalog", &"MediaCatalog { ... }")
            .field("art_cache", &self.art_cache.as_ref().map(|_| "ArtCache { ... }"))
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("player", &self.player)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.player.validate()
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn audio_output_missing_error() -> Error {
    capability_missing(
        "AudioOutput",
        "An AudioOutput implementation is required to render audio. \
         Desktop: enable the 'desktop-shims' feature to use HeadlessOutput. \
         Mobile: inject the platform media player adapter.",
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn focus_provider_missing_error() -> Error {
    capability_missing(
        "AudioFocusProvider",
        "An AudioFocusProvider implementation is required to coordinate with other audio apps. \
         Desktop: enable the 'desktop-shims' feature to use LocalFocusArbiter. \
         Mobile: inject the platform audio focus / audio session adapter.",
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    capability_missing(
        "SettingsStore",
        "A SettingsStore implementation is required to persist the listening session. \
         Desktop: enable the 'desktop-shims' feature to use SqliteSettingsStore. \
         Mobile: inject platform-native settings (UserDefaults/SharedPreferences).",
    )
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_output() -> Result<Box<dyn AudioOutput>> {
    Ok(Box::new(bridge_desktop::HeadlessOutput::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_output() -> Result<Box<dyn AudioOutput>> {
    Err(audio_output_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_focus_provider() -> Result<Arc<dyn AudioFocusProvider>> {
    use bridge_desktop::{FocusKind, LocalFocusArbiter};

    let client = LocalFocusArbiter::new().client(FocusKind::Permanent);
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_focus_provider() -> Result<Arc<dyn AudioFocusProvider>> {
    Err(focus_provider_missing_error())
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store() -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;

    let path = SqliteSettingsStore::default_path().ok_or_else(|| {
        capability_missing(
            "SettingsStore",
            "No user data directory found for the default settings database. \
             Inject a SettingsStore explicitly.",
        )
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let store = SqliteSettingsStore::new(path).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store() -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[derive(Default)]
pub struct CoreConfigBuilder {
    audio_output: Option<Box<dyn AudioOutput>>,
    focus_provider: Option<Arc<dyn AudioFocusProvider>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    catalog: Option<Arc<dyn MediaCatalog>>,
    art_cache: Option<Arc<dyn ArtCache>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
    player: PlayerConfig,
}

impl CoreConfigBuilder {
    pub fn audio_output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn focus_provider(mut self, provider: Arc<dyn AudioFocusProvider>) -> Self {
        self.focus_provider = Some(provider);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn MediaCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn art_cache(mut self, cache: Arc<dyn ArtCache>) -> Self {
        self.art_cache = Some(cache);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn player(mut self, player: PlayerConfig) -> Self {
        self.player = player;
        self
    }

    /// Resolve defaults and validate.
    ///
    /// Async because the default desktop settings store opens its database.
    pub async fn build(self) -> Result<CoreConfig> {
        let catalog = self.catalog.ok_or_else(|| {
            capability_missing(
                "MediaCatalog",
                "A MediaCatalog is required to resolve the persisted queue. \
                 Use InMemoryCatalog if the host indexes media itself.",
            )
        })?;

        let audio_output = match self.audio_output {
            Some(output) => output,
            None => provide_default_audio_output()?,
        };

        let focus_provider = match self.focus_provider {
            Some(provider) => provider,
            None => provide_default_focus_provider()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store().await?,
        };

        let config = CoreConfig {
            audio_output,
            focus_provider,
            settings_store,
            catalog,
            art_cache: self.art_cache,
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            player: self.player,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{FocusKind, HeadlessOutput, LocalFocusArbiter, SqliteSettingsStore};
    use core_library::InMemoryCatalog;

    async fn complete_builder() -> CoreConfigBuilder {
        let settings = SqliteSettingsStore::in_memory().await.unwrap();
        CoreConfig::builder()
            .audio_output(Box::new(HeadlessOutput::new()))
            .focus_provider(Arc::new(LocalFocusArbiter::new().client(FocusKind::Permanent)))
            .settings_store(Arc::new(settings))
            .catalog(Arc::new(InMemoryCatalog::default()))
    }

    #[tokio::test]
    async fn test_builder_with_all_capabilities() {
        let config = complete_builder().await.build().await.unwrap();

        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.player, PlayerConfig::default());
        assert!(config.art_cache.is_none());
    }

    #[tokio::test]
    async fn test_builder_requires_catalog() {
        let err = CoreConfig::builder().build().await.unwrap_err();
        assert!(matches!(
            err,
            Error::CapabilityMissing { ref capability, .. } if capability == "MediaCatalog"
        ));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[tokio::test]
    async fn test_builder_requires_audio_output() {
        let err = CoreConfig::builder()
            .catalog(Arc::new(InMemoryCatalog::default()))
            .build()
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("AudioOutput"));
        assert!(message.contains("desktop-shims"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[tokio::test]
    async fn test_builder_requires_settings_store() {
        let err = CoreConfig::builder()
            .catalog(Arc::new(InMemoryCatalog::default()))
            .audio_output(Box::new(HeadlessOutput::new()))
            .focus_provider(Arc::new(LocalFocusArbiter::new().client(FocusKind::Permanent)))
            .build()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("persist the listening session"));
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_player_config() {
        let err = complete_builder()
            .await
            .player(PlayerConfig::default().with_tick_interval(Duration::from_millis(1)))
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_event_buffer() {
        let err = complete_builder()
            .await
            .event_buffer_size(0)
            .build()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Event buffer size"));
    }

    #[test]
    fn test_player_config_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
        assert_eq!(config.command_buffer, 64);
        assert!(config.skip_unplayable);
        assert!(config.persist_session);
        assert!(config.shuffle_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_player_config_partial_json_uses_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "skip_unplayable": false, "shuffle_seed": 7 }"#).unwrap();

        assert!(!config.skip_unplayable);
        assert_eq!(config.shuffle_seed, Some(7));
        assert_eq!(config.tick_interval_ms, 200);
    }

    #[test]
    fn test_player_config_rejects_empty_command_buffer() {
        let config = PlayerConfig::default().with_command_buffer(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_player_config_debug() {
        let rendered = format!("{:?}", PlayerConfig::default().with_shuffle_seed(3));
        assert!(rendered.contains("shuffle_seed: Some(3)"));
    }
}
