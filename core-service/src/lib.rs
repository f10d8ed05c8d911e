//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (audio output, audio
//! focus, settings store, media catalog, art cache) into the shared Rust core
//! and starts the playback engine. Favorites and playlists default to
//! repositories on the same settings store. Desktop apps typically enable the
//! `desktop-shims` feature, which fills in the `bridge-desktop` output, focus
//! arbiter and SQLite settings store; mobile hosts inject their own adapters.

pub mod error;
pub mod now_playing;

pub use error::{CoreError, Result};
pub use now_playing::{NotificationAction, NowPlaying};

pub use core_library::{
    ArtCache, FavoritesRepository, InMemoryCatalog, MediaCatalog, Playlist, PlaylistRepository,
    Track, TrackId,
};
pub use core_playback::{
    CommandOutcome, MediaCommand, PlaybackError, PlayerConfig, PlayerHandle, PlayerState,
    RejectReason,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent, SessionEvent};

use bridge_traits::focus::AudioFocusProvider;
use bridge_traits::playback::AudioOutput;
use bridge_traits::storage::SettingsStore;
use core_library::{SettingsFavoritesRepository, SettingsPlaylistRepository};
use core_playback::{EngineParts, PlaybackEngine};
use core_runtime::logging::{init_logging, LoggingConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub audio_output: Box<dyn AudioOutput>,
    pub focus_provider: Arc<dyn AudioFocusProvider>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub catalog: Arc<dyn MediaCatalog>,
    pub art_cache: Option<Arc<dyn ArtCache>>,
    pub favorites: Arc<dyn FavoritesRepository>,
    pub playlists: Arc<dyn PlaylistRepository>,
    pub event_buffer_size: usize,
    pub player: PlayerConfig,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        audio_output: Box<dyn AudioOutput>,
        focus_provider: Arc<dyn AudioFocusProvider>,
        settings_store: Arc<dyn SettingsStore>,
        catalog: Arc<dyn MediaCatalog>,
    ) -> Self {
        Self {
            audio_output,
            focus_provider,
            favorites: Arc::new(SettingsFavoritesRepository::new(Arc::clone(&settings_store))),
            playlists: Arc::new(SettingsPlaylistRepository::new(Arc::clone(&settings_store))),
            settings_store,
            catalog,
            art_cache: None,
            event_buffer_size: core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE,
            player: PlayerConfig::default(),
        }
    }

    pub fn with_art_cache(mut self, cache: Arc<dyn ArtCache>) -> Self {
        self.art_cache = Some(cache);
        self
    }

    pub fn with_player_config(mut self, player: PlayerConfig) -> Self {
        self.player = player;
        self
    }

    pub fn with_favorites(mut self, favorites: Arc<dyn FavoritesRepository>) -> Self {
        self.favorites = favorites;
        self
    }

    pub fn with_playlists(mut self, playlists: Arc<dyn PlaylistRepository>) -> Self {
        self.playlists = playlists;
        self
    }
}

impl From<CoreConfig> for CoreDependencies {
    fn from(config: CoreConfig) -> Self {
        let mut deps = Self::new(
            config.audio_output,
            config.focus_provider,
            config.settings_store,
            config.catalog,
        );
        deps.art_cache = config.art_cache;
        deps.event_buffer_size = config.event_buffer_size;
        deps.player = config.player;
        deps
    }
}

struct Inner {
    player: PlayerHandle,
    events: EventBus,
    settings: Arc<dyn SettingsStore>,
    catalog: Arc<dyn MediaCatalog>,
    art_cache: Option<Arc<dyn ArtCache>>,
    favorites: Arc<dyn FavoritesRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    engine: Mutex<Option<JoinHandle<()>>>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<Inner>,
}

impl CoreService {
    /// Start the playback engine and restore the saved session.
    ///
    /// Resolves once the saved session has been applied or skipped. Must be
    /// called inside a tokio runtime.
    pub async fn start(deps: CoreDependencies) -> Result<Self> {
        deps.player.validate()?;
        if deps.event_buffer_size == 0 {
            return Err(CoreError::InitializationFailed(
                "event buffer size must be greater than 0".to_string(),
            ));
        }

        let events = EventBus::new(deps.event_buffer_size);
        let (player, engine) = PlaybackEngine::spawn(EngineParts {
            output: deps.audio_output,
            focus: deps.focus_provider,
            settings: Arc::clone(&deps.settings_store),
            catalog: Arc::clone(&deps.catalog),
            events: events.clone(),
            config: deps.player,
        });

        let restored = player.restore().await?;
        info!(?restored, "Core service started");

        Ok(Self {
            inner: Arc::new(Inner {
                player,
                events,
                settings: deps.settings_store,
                catalog: deps.catalog,
                art_cache: deps.art_cache,
                favorites: deps.favorites,
                playlists: deps.playlists,
                engine: Mutex::new(Some(engine)),
            }),
        })
    }

    /// Command handle of the playback engine.
    pub fn player(&self) -> PlayerHandle {
        self.inner.player.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> EventStream {
        self.inner.events.stream()
    }

    pub fn settings(&self) -> Arc<dyn SettingsStore> {
        Arc::clone(&self.inner.settings)
    }

    pub fn favorites(&self) -> Arc<dyn FavoritesRepository> {
        Arc::clone(&self.inner.favorites)
    }

    pub fn playlists(&self) -> Arc<dyn PlaylistRepository> {
        Arc::clone(&self.inner.playlists)
    }

    /// Favorite tracks still present in the catalog.
    pub async fn favorite_tracks(&self) -> Result<Vec<Track>> {
        Ok(self.inner.favorites.tracks(self.inner.catalog.as_ref()).await?)
    }

    /// Tracks of the named playlist still present in the catalog, `None`
    /// when there is no such playlist.
    pub async fn playlist_tracks(&self, title: &str) -> Result<Option<Vec<Track>>> {
        Ok(self
            .inner
            .playlists
            .tracks(title, self.inner.catalog.as_ref())
            .await?)
    }

    /// Card for notification presenters, `None` when nothing is queued.
    pub async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        let state = self.inner.player.state().await?;
        Ok(NowPlaying::from_state(&state, self.inner.art_cache.as_deref()).await)
    }

    /// Stop playback, save the session and wait for the engine to finish.
    ///
    /// Later calls are no-ops.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(engine) = self.inner.engine.lock().take() else {
            return Ok(());
        };

        self.inner.player.shutdown().await?;
        if let Err(e) = engine.await {
            warn!(error = %e, "Playback engine task failed");
            return Err(CoreError::EngineTask(e.to_string()));
        }
        info!("Core service stopped");
        Ok(())
    }
}

/// Start the core from a resolved [`CoreConfig`].
///
/// When the config carries a logger sink, global logging is initialized with
/// it first; a subscriber installed earlier by the host is left in place.
///
/// ```ignore
/// use core_service::{bootstrap, CoreConfig, InMemoryCatalog};
///
/// let config = CoreConfig::builder()
///     .catalog(Arc::new(InMemoryCatalog::new(tracks)))
///     .build()
///     .await?;
/// let core = bootstrap(config).await?;
/// core.player().load_queue(queue, 0).await?;
/// ```
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    if let Some(sink) = config.logger_sink.clone() {
        if let Err(e) = init_logging(LoggingConfig::default().with_logger_sink(sink)) {
            warn!(error = %e, "Logging already initialized, keeping existing subscriber");
        }
    }

    CoreService::start(CoreDependencies::from(config)).await
}

/// Start the core on desktop defaults with the given catalog.
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(catalog: Arc<dyn MediaCatalog>) -> Result<CoreService> {
    let config = CoreConfig::builder().catalog(catalog).build().await?;
    bootstrap(config).await
}
