//! Shared harness for engine tests: a headless output with fixed-length
//! sources, an in-process focus arbiter and an in-memory settings database.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::{FocusKind, HeadlessOutput, LocalFocusArbiter, SqliteSettingsStore};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    AudioOutput, LoadRequest, OutputEvent, PlaybackStatus, PlaybackToken,
};
use core_library::catalog::{InMemoryCatalog, MediaCatalog};
use core_library::models::Track;
use core_playback::{EngineParts, PlaybackEngine, PlayerConfig, PlayerHandle, PlayerState};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, SessionEvent};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, Receiver};
use tokio::task::JoinHandle;

pub const TRACK_LENGTH: Duration = Duration::from_secs(3);
const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// `count` playable tracks with ids `1..=count`.
pub fn tracks(count: i64) -> Vec<Track> {
    (1..=count)
        .map(|id| {
            Track::new(id, format!("Track {}", id), format!("/music/{}.mp3", id))
                .with_artist("Artist", Some(1))
                .with_album("Album", Some(1))
        })
        .collect()
}

/// A track whose file cannot be read.
pub fn broken(id: i64) -> Track {
    Track::new(id, format!("Broken {}", id), format!("/music/broken-{}.mp3", id))
}

fn fixed_output(delay: Option<Duration>, length: Option<Duration>) -> HeadlessOutput {
    HeadlessOutput::with_prober(Arc::new(move |path: &Path| {
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if path.to_string_lossy().contains("broken") {
            Err(BridgeError::UnsupportedSource("no decoder for stream".to_string()))
        } else {
            Ok(length)
        }
    }))
}

/// Output driven by the test: every load is prepared at once and any event,
/// stale ones included, can be injected with [`ScriptedOutput::send`].
#[derive(Clone)]
pub struct ScriptedOutput {
    loads: Arc<Mutex<Vec<PlaybackToken>>>,
    events: broadcast::Sender<OutputEvent>,
}

impl ScriptedOutput {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            loads: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Tokens of every load request, oldest first.
    pub fn loads(&self) -> Vec<PlaybackToken> {
        self.loads.lock().clone()
    }

    pub fn send(&self, event: OutputEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AudioOutput for ScriptedOutput {
    async fn load(&self, request: LoadRequest) -> BridgeResult<()> {
        self.loads.lock().push(request.token);
        self.send(OutputEvent::Prepared {
            token: request.token,
            duration: Some(TRACK_LENGTH),
        });
        Ok(())
    }

    async fn start(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(Duration::ZERO)
    }

    async fn release(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}

pub struct Harness {
    pub player: PlayerHandle,
    pub task: JoinHandle<()>,
    pub events: Receiver<CoreEvent>,
    pub arbiter: LocalFocusArbiter,
    pub output: HeadlessOutput,
    pub settings: Arc<SqliteSettingsStore>,
    pub catalog: Arc<InMemoryCatalog>,
}

pub struct HarnessBuilder {
    config: PlayerConfig,
    settings: Option<Arc<SqliteSettingsStore>>,
    catalog: Vec<Track>,
    catalog_source: Option<Arc<dyn MediaCatalog>>,
    prepare_delay: Option<Duration>,
    track_length: Option<Duration>,
    output: Option<Box<dyn AudioOutput>>,
}

impl HarnessBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn settings(mut self, settings: Arc<SqliteSettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn catalog(mut self, tracks: Vec<Track>) -> Self {
        self.catalog = tracks;
        self
    }

    /// Hand the engine this catalog instead of an in-memory one.
    pub fn catalog_source(mut self, catalog: Arc<dyn MediaCatalog>) -> Self {
        self.catalog_source = Some(catalog);
        self
    }

    pub fn prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = Some(delay);
        self
    }

    /// Tracks whose containers report no length.
    pub fn unknown_length(mut self) -> Self {
        self.track_length = None;
        self
    }

    /// Render through `output` instead of the headless output.
    pub fn output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub async fn start(self) -> Harness {
        let settings = match self.settings {
            Some(settings) => settings,
            None => {
                // A paused clock auto-advances while sqlx opens the connection
                // on its worker thread, tripping the pool's acquire timeout.
                // Connect on a running clock, then pause again.
                let paused = std::panic::catch_unwind(tokio::time::resume).is_ok();
                let store = SqliteSettingsStore::in_memory().await.unwrap();
                if paused {
                    tokio::time::pause();
                }
                Arc::new(store)
            }
        };
        let catalog = Arc::new(InMemoryCatalog::new(self.catalog));
        let arbiter = LocalFocusArbiter::new();
        let output = fixed_output(self.prepare_delay, self.track_length);
        let bus = EventBus::new(1024);
        let events = bus.subscribe();

        let (player, task) = PlaybackEngine::spawn(EngineParts {
            output: self
                .output
                .unwrap_or_else(|| Box::new(output.clone()) as Box<dyn AudioOutput>),
            focus: Arc::new(arbiter.client(FocusKind::Permanent)),
            settings: settings.clone(),
            catalog: self
                .catalog_source
                .unwrap_or_else(|| catalog.clone() as Arc<dyn MediaCatalog>),
            events: bus,
            config: self.config,
        });

        Harness {
            player,
            task,
            events,
            arbiter,
            output,
            settings,
            catalog,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            config: PlayerConfig::default().with_shuffle_seed(7),
            settings: None,
            catalog: Vec::new(),
            catalog_source: None,
            prepare_delay: None,
            track_length: Some(TRACK_LENGTH),
            output: None,
        }
    }

    pub async fn start() -> Harness {
        Self::builder().start().await
    }

    /// Poll the engine until `predicate` holds.
    pub async fn wait_for(&self, predicate: impl Fn(&PlayerState) -> bool) -> PlayerState {
        let player = self.player.clone();
        let waited = tokio::time::timeout(WAIT_LIMIT, async move {
            loop {
                let state = player.state().await.unwrap();
                if predicate(&state) {
                    return state;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        match waited {
            Ok(state) => state,
            Err(_) => panic!(
                "engine never reached the expected state; last state {:?}",
                self.player.state().await
            ),
        }
    }

    pub async fn wait_for_status(&self, status: PlaybackStatus) -> PlayerState {
        self.wait_for(|state| state.status == status).await
    }

    /// Load `tracks` at `start` and wait until the start track is prepared.
    pub async fn load_prepared(&self, tracks: Vec<Track>, start: usize) -> PlayerState {
        self.player.load_queue(tracks, start).await.unwrap();
        self.wait_for_status(PlaybackStatus::Paused).await
    }

    pub async fn load_playing(&self, tracks: Vec<Track>, start: usize) -> PlayerState {
        self.load_prepared(tracks, start).await;
        self.player.play().await.unwrap();
        self.wait_for_status(PlaybackStatus::Playing).await
    }

    /// Next playback event matching `predicate`, skipping the rest.
    pub async fn next_playback(&mut self, predicate: impl Fn(&PlaybackEvent) -> bool) -> PlaybackEvent {
        let events = &mut self.events;
        tokio::time::timeout(WAIT_LIMIT, async move {
            loop {
                if let CoreEvent::Playback(event) = events.recv().await.unwrap() {
                    if predicate(&event) {
                        return event;
                    }
                }
            }
        })
        .await
        .expect("playback event not emitted")
    }

    pub async fn next_session(&mut self) -> SessionEvent {
        let events = &mut self.events;
        tokio::time::timeout(WAIT_LIMIT, async move {
            loop {
                if let CoreEvent::Session(event) = events.recv().await.unwrap() {
                    return event;
                }
            }
        })
        .await
        .expect("session event not emitted")
    }

    /// Everything emitted so far without waiting.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn shutdown(self) {
        self.player.shutdown().await.unwrap();
        self.task.await.unwrap();
    }
}
