//! Headless audio output.
//!
//! Validates sources by probing them with Symphonia and then renders against
//! the runtime clock instead of a sound device: position advances while
//! started and a completion event fires when it reaches the probed duration.
//! A source of unknown length renders until it is paused or released.
//! Used by CLI hosts, CI and integration tests.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioOutput, AudioSource, LoadRequest, OutputEvent, PlaybackToken},
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

const EVENT_CAPACITY: usize = 32;

/// Resolves a local file to its playable duration, `None` when unknown.
pub type Prober = Arc<dyn Fn(&Path) -> Result<Option<Duration>> + Send + Sync>;

/// Open `path` with Symphonia and report the duration of its first decodable track.
///
/// Returns `Ok(None)` when the container carries no frame count. Fails when the file cannot be read, the container is not recognised or no
/// track has a supported codec.
pub fn probe_duration(path: &Path) -> Result<Option<Duration>> {
    let file = std::fs::File::open(path)?;
    let media_source = Box::new(file) as Box<dyn MediaSource>;
    let stream = MediaSourceStream::new(media_source, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BridgeError::UnsupportedSource(format!("Failed to probe format: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BridgeError::UnsupportedSource("No supported audio tracks".to_string()))?;

    symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BridgeError::UnsupportedSource(format!("Unsupported codec: {}", e)))?;

    let params = &track.codec_params;
    let duration = match (params.time_base, params.n_frames, params.sample_rate) {
        (Some(time_base), Some(frames), _) => {
            let time = time_base.calc_time(frames);
            Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
        }
        (None, Some(frames), Some(rate)) if rate > 0 => {
            Duration::from_secs_f64(frames as f64 / rate as f64)
        }
        _ => return Ok(None),
    };

    Ok(Some(duration).filter(|duration| !duration.is_zero()))
}

struct Loaded {
    token: PlaybackToken,
    /// Set once the probe accepted the source.
    prepared: bool,
    /// Probed length, `None` when the source does not report one.
    duration: Option<Duration>,
    /// Position at the last pause/seek.
    offset: Duration,
    /// Set while rendering.
    started_at: Option<Instant>,
    probe: Option<JoinHandle<()>>,
    finish: Option<JoinHandle<()>>,
}

impl Loaded {
    fn position(&self) -> Duration {
        let elapsed = self
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let position = self.offset + elapsed;
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn cancel_finish(&mut self) {
        if let Some(handle) = self.finish.take() {
            handle.abort();
        }
    }

    fn abort_all(&mut self) {
        self.cancel_finish();
        if let Some(handle) = self.probe.take() {
            handle.abort();
        }
    }
}

struct Shared {
    loaded: Mutex<Option<Loaded>>,
    events: broadcast::Sender<OutputEvent>,
}

/// Clock-driven [`AudioOutput`] with no sound device behind it.
#[derive(Clone)]
pub struct HeadlessOutput {
    shared: Arc<Shared>,
    prober: Prober,
}

impl Default for HeadlessOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessOutput {
    /// Output that validates sources with [`probe_duration`].
    pub fn new() -> Self {
        Self::with_prober(Arc::new(probe_duration))
    }

    /// Output with a custom duration resolver.
    pub fn with_prober(prober: Prober) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                loaded: Mutex::new(None),
                events,
            }),
            prober,
        }
    }

    /// Output that accepts every source as `duration` long without reading it.
    ///
    /// A zero duration makes every source one of unknown length.
    pub fn with_fixed_duration(duration: Duration) -> Self {
        let duration = Some(duration).filter(|duration| !duration.is_zero());
        Self::with_prober(Arc::new(move |_path: &Path| -> Result<Option<Duration>> {
            Ok(duration)
        }))
    }

    pub fn is_rendering(&self) -> bool {
        self.shared
            .loaded
            .lock()
            .as_ref()
            .is_some_and(|loaded| loaded.started_at.is_some())
    }

    fn local_path(source: &AudioSource) -> PathBuf {
        match source {
            AudioSource::LocalFile { path } => path.clone(),
        }
    }

    /// Arm the completion timer for the remaining part of the track.
    ///
    /// Sources of unknown length never complete on their own.
    fn schedule_finish(shared: &Arc<Shared>, loaded: &mut Loaded) {
        loaded.cancel_finish();

        let Some(duration) = loaded.duration else {
            return;
        };

        let remaining = duration.saturating_sub(loaded.offset);
        let token = loaded.token;
        let shared_for_task = Arc::clone(shared);

        loaded.finish = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;

            let finished = {
                let mut guard = shared_for_task.loaded.lock();
                match guard.as_mut() {
                    Some(loaded) if loaded.token == token && loaded.started_at.is_some() => {
                        loaded.offset = duration;
                        loaded.started_at = None;
                        loaded.finish = None;
                        true
                    }
                    _ => false,
                }
            };

            if finished {
                debug!(%token, "Headless output reached end of track");
                let _ = shared_for_task.events.send(OutputEvent::Completed { token });
            }
        }));
    }

    fn with_prepared<T>(&self, f: impl FnOnce(&mut Loaded) -> T) -> Result<T> {
        let mut guard = self.shared.loaded.lock();
        match guard.as_mut() {
            Some(loaded) if loaded.prepared => Ok(f(loaded)),
            _ => Err(BridgeError::NothingLoaded),
        }
    }
}

#[async_trait]
impl AudioOutput for HeadlessOutput {
    #[instrument(skip(self, request), fields(token = %request.token))]
    async fn load(&self, request: LoadRequest) -> Result<()> {
        let token = request.token;
        let path = Self::local_path(&request.source);
        let prober = Arc::clone(&self.prober);
        let shared = Arc::clone(&self.shared);

        let mut guard = self.shared.loaded.lock();
        if let Some(previous) = guard.as_mut() {
            previous.abort_all();
        }

        let probe = tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || prober(&path))
                .await
                .unwrap_or_else(|e| {
                    Err(BridgeError::OperationFailed(format!("Probe task failed: {}", e)))
                });

            let event = {
                let mut guard = shared.loaded.lock();
                let current = guard.as_ref().is_some_and(|loaded| loaded.token == token);
                if !current {
                    return;
                }

                match result {
                    Ok(duration) => {
                        if let Some(loaded) = guard.as_mut() {
                            loaded.prepared = true;
                            loaded.duration = duration;
                            loaded.probe = None;
                        }
                        OutputEvent::Prepared { token, duration }
                    }
                    Err(e) => {
                        warn!(%token, error = %e, "Source rejected");
                        *guard = None;
                        OutputEvent::PrepareFailed {
                            token,
                            message: e.to_string(),
                        }
                    }
                }
            };

            let _ = shared.events.send(event);
        });

        *guard = Some(Loaded {
            token,
            prepared: false,
            duration: None,
            offset: Duration::ZERO,
            started_at: None,
            probe: Some(probe),
            finish: None,
        });

        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        self.with_prepared(|loaded| {
            if loaded.started_at.is_none() {
                loaded.started_at = Some(Instant::now());
                Self::schedule_finish(&shared, loaded);
            }
        })
    }

    async fn pause(&self) -> Result<()> {
        self.with_prepared(|loaded| {
            loaded.offset = loaded.position();
            loaded.started_at = None;
            loaded.cancel_finish();
        })
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        self.with_prepared(|loaded| {
            loaded.offset = match loaded.duration {
                Some(duration) => position.min(duration),
                None => position,
            };
            if loaded.started_at.is_some() {
                loaded.started_at = Some(Instant::now());
                Self::schedule_finish(&shared, loaded);
            }
        })
    }

    async fn position(&self) -> Result<Duration> {
        self.with_prepared(|loaded| loaded.position())
    }

    async fn release(&self) -> Result<()> {
        if let Some(mut loaded) = self.shared.loaded.lock().take() {
            loaded.abort_all();
            debug!(token = %loaded.token, "Released headless source");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.shared.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(duration: Duration) -> HeadlessOutput {
        HeadlessOutput::with_fixed_duration(duration)
    }

    fn request(token: u64) -> LoadRequest {
        LoadRequest::new(PlaybackToken::new(token), AudioSource::local("/music/a.flac"))
    }

    #[tokio::test]
    async fn missing_file_fails_preparation() {
        let output = HeadlessOutput::new();
        let mut events = output.subscribe();

        let missing = LoadRequest::new(
            PlaybackToken::new(1),
            AudioSource::local("/definitely/not/here.mp3"),
        );
        output.load(missing).await.unwrap();

        match events.recv().await.unwrap() {
            OutputEvent::PrepareFailed { token, .. } => assert_eq!(token.value(), 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(output.start().await, Err(BridgeError::NothingLoaded)));
    }

    #[tokio::test(start_paused = true)]
    async fn renders_to_completion() {
        let output = fixed(Duration::from_secs(3));
        let mut events = output.subscribe();

        output.load(request(4)).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            OutputEvent::Prepared {
                token: PlaybackToken::new(4),
                duration: Some(Duration::from_secs(3))
            }
        );

        output.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(output.position().await.unwrap(), Duration::from_secs(1));

        assert_eq!(
            events.recv().await.unwrap(),
            OutputEvent::Completed {
                token: PlaybackToken::new(4)
            }
        );
        assert!(!output.is_rendering());
        assert_eq!(output.position().await.unwrap(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_position_and_seek_clamps() {
        let output = fixed(Duration::from_secs(10));
        let mut events = output.subscribe();

        output.load(request(1)).await.unwrap();
        events.recv().await.unwrap();

        output.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        output.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(output.position().await.unwrap(), Duration::from_secs(2));

        output.seek(Duration::from_secs(60)).await.unwrap();
        assert_eq!(output.position().await.unwrap(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn reload_discards_previous_source() {
        let output = fixed(Duration::from_secs(1));
        let mut events = output.subscribe();

        output.load(request(1)).await.unwrap();
        events.recv().await.unwrap();
        output.start().await.unwrap();

        output.load(request(2)).await.unwrap();
        let prepared = events.recv().await.unwrap();
        assert_eq!(prepared.token(), PlaybackToken::new(2));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(events.try_recv().is_err(), "first source must not complete");
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_length_renders_until_paused() {
        let output = fixed(Duration::ZERO);
        let mut events = output.subscribe();

        output.load(request(1)).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            OutputEvent::Prepared {
                token: PlaybackToken::new(1),
                duration: None
            }
        );

        output.start().await.unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(events.try_recv().is_err(), "source must not complete on its own");
        assert!(output.is_rendering());
        assert_eq!(output.position().await.unwrap(), Duration::from_secs(3600));

        output.seek(Duration::from_secs(7200)).await.unwrap();
        output.pause().await.unwrap();
        assert_eq!(output.position().await.unwrap(), Duration::from_secs(7200));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn release_without_source_is_harmless() {
        let output = fixed(Duration::from_secs(1));
        output.release().await.unwrap();
        assert!(output.position().await.is_err());
    }
}
