//! Playback engine actor.
//!
//! One tokio task owns the audio output, the queue, the cursor and the focus
//! grant. Everything that can change them (handle commands, output events,
//! focus changes, clock ticks, background results) is a message drained by
//! that task, so transitions are applied strictly one at a time and events
//! leave the engine in transition order.

use crate::command::{CommandOutcome, MediaCommand, RejectReason};
use crate::error::Result;
use crate::focus::AudioFocusArbiter;
use crate::handle::PlayerHandle;
use crate::queue::PlayQueue;
use crate::session::{plan_restore, RestoreOutcome, RestorePlan, SessionSnapshot, SessionWriter};
use crate::ticker::{PositionTicker, Tick};
use bridge_traits::focus::{AudioFocusProvider, FocusChange};
use bridge_traits::playback::{
    AudioOutput, LoadRequest, OutputEvent, PlaybackStatus, PlaybackToken, RepeatMode,
};
use bridge_traits::storage::SettingsStore;
use core_library::catalog::MediaCatalog;
use core_library::models::Track;
use core_runtime::config::PlayerConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, PlayerState, SessionEvent};
use core_runtime::logging::redact_locator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Operations a [`PlayerHandle`] can ask for.
#[derive(Debug)]
pub(crate) enum Request {
    LoadQueue { tracks: Vec<Track>, start_index: usize },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Next,
    Previous,
    SetShuffle(bool),
    SetRepeatMode(RepeatMode),
    CycleRepeatMode,
    SetPlaying(bool),
    Dispatch(MediaCommand),
    Restore,
}

pub(crate) enum Command {
    Request {
        request: Request,
        reply: oneshot::Sender<CommandOutcome>,
    },
    State {
        reply: oneshot::Sender<PlayerState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results of work the engine pushed off its own task.
enum Internal {
    LoadFailed {
        token: PlaybackToken,
        message: String,
    },
    RestoreLoaded(Result<RestoreOutcome>),
}

/// Capabilities and settings the engine is built from.
pub struct EngineParts {
    pub output: Box<dyn AudioOutput>,
    pub focus: Arc<dyn AudioFocusProvider>,
    pub settings: Arc<dyn SettingsStore>,
    pub catalog: Arc<dyn MediaCatalog>,
    pub events: EventBus,
    pub config: PlayerConfig,
}

struct Inbox {
    commands: mpsc::Receiver<Command>,
    internal: mpsc::UnboundedReceiver<Internal>,
    ticks: mpsc::Receiver<Tick>,
    output_events: broadcast::Receiver<OutputEvent>,
    focus_events: broadcast::Receiver<FocusChange>,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

pub struct PlaybackEngine {
    output: Box<dyn AudioOutput>,
    focus: AudioFocusArbiter,
    settings: Arc<dyn SettingsStore>,
    catalog: Arc<dyn MediaCatalog>,
    events: EventBus,
    config: PlayerConfig,

    queue: PlayQueue,
    cursor: Option<usize>,
    shuffle: bool,
    repeat_mode: RepeatMode,
    rng: StdRng,

    status: PlaybackStatus,
    token: PlaybackToken,
    duration: Option<Duration>,
    position: Duration,
    unplayable: bool,
    consecutive_failures: usize,
    play_when_ready: bool,
    pending_seek: Option<Duration>,
    resume_on_focus_gain: bool,

    ticker: PositionTicker,
    session: Option<SessionWriter>,
    restore_started: bool,
    restore_reply: Option<oneshot::Sender<CommandOutcome>>,
    internal: mpsc::UnboundedSender<Internal>,
}

impl PlaybackEngine {
    /// Start the engine task.
    ///
    /// The engine runs until [`PlayerHandle::shutdown`] is called or every
    /// handle has been dropped.
    pub fn spawn(parts: EngineParts) -> (PlayerHandle, JoinHandle<()>) {
        let EngineParts {
            output,
            focus,
            settings,
            catalog,
            events,
            config,
        } = parts;

        let (command_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (internal_tx, internal) = mpsc::unbounded_channel();
        let (ticker, ticks) = PositionTicker::new(config.tick_interval());
        let focus = AudioFocusArbiter::new(focus);

        let inbox = Inbox {
            commands,
            internal,
            ticks,
            output_events: output.subscribe(),
            focus_events: focus.subscribe(),
        };

        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let session = config
            .persist_session
            .then(|| SessionWriter::spawn(Arc::clone(&settings), events.clone()));

        let engine = Self {
            output,
            focus,
            settings,
            catalog,
            events,
            config,
            queue: PlayQueue::default(),
            cursor: None,
            shuffle: false,
            repeat_mode: RepeatMode::default(),
            rng,
            status: PlaybackStatus::Idle,
            token: PlaybackToken::default(),
            duration: None,
            position: Duration::ZERO,
            unplayable: false,
            consecutive_failures: 0,
            play_when_ready: false,
            pending_seek: None,
            resume_on_focus_gain: false,
            ticker,
            session,
            restore_started: false,
            restore_reply: None,
            internal: internal_tx,
        };

        let task = tokio::spawn(engine.run(inbox));
        (PlayerHandle::new(command_tx), task)
    }

    async fn run(mut self, mut inbox: Inbox) {
        info!("Playback engine started");
        let mut output_open = true;
        let mut focus_open = true;
        let mut shutdown_reply = None;

        loop {
            tokio::select! {
                command = inbox.commands.recv() => match command {
                    Some(Command::Request { request, reply }) => self.on_request(request, reply).await,
                    Some(Command::State { reply }) => {
                        let _ = reply.send(self.state());
                    }
                    Some(Command::Shutdown { reply }) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    None => break,
                },
                event = inbox.output_events.recv(), if output_open => match event {
                    Ok(event) => self.on_output_event(event).await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Audio output events lagged"),
                    Err(RecvError::Closed) => output_open = false,
                },
                change = inbox.focus_events.recv(), if focus_open => match change {
                    Ok(change) => self.on_focus_change(change).await,
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Focus events lagged"),
                    Err(RecvError::Closed) => focus_open = false,
                },
                Some(tick) = inbox.ticks.recv() => self.on_tick(tick).await,
                Some(message) = inbox.internal.recv() => self.on_internal(message).await,
            }
        }

        self.shutdown().await;
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        info!("Playback engine stopped");
    }

    async fn on_request(&mut self, request: Request, reply: oneshot::Sender<CommandOutcome>) {
        trace!(?request, "Handling request");
        let outcome = match request {
            Request::Restore => {
                self.begin_restore(reply);
                return;
            }
            Request::LoadQueue {
                tracks,
                start_index,
            } => self.load_queue(tracks, start_index).await,
            Request::Play => self.play().await,
            Request::Pause => self.pause(false).await,
            Request::Stop => self.stop().await,
            Request::Seek(position) => self.seek(position).await,
            Request::Next => self.skip(Direction::Forward).await,
            Request::Previous => self.skip(Direction::Backward).await,
            Request::SetShuffle(enabled) => self.set_shuffle(enabled),
            Request::SetRepeatMode(mode) => self.set_repeat_mode(mode),
            Request::CycleRepeatMode => self.set_repeat_mode(self.repeat_mode.cycled()),
            Request::SetPlaying(true) => self.play().await,
            Request::SetPlaying(false) => self.pause(false).await,
            Request::Dispatch(command) => self.dispatch(command).await,
        };
        let _ = reply.send(outcome);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    async fn load_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> CommandOutcome {
        if start_index >= tracks.len() {
            debug!(start_index, "Start index outside the queue");
            return CommandOutcome::Ignored;
        }

        self.queue = PlayQueue::new(tracks);
        if self.shuffle {
            self.queue.shuffle(&mut self.rng);
        }
        self.cursor = self.queue.position_of(start_index);
        self.consecutive_failures = 0;

        self.focus.abandon().await;
        self.resume_on_focus_gain = false;

        self.emit(PlaybackEvent::QueueLoaded {
            queue_len: self.queue.len(),
            start_index,
        });
        self.load_track(false).await;
        self.announce_track();
        self.publish_state();
        self.persist();
        CommandOutcome::Applied
    }

    async fn play(&mut self) -> CommandOutcome {
        match self.status {
            PlaybackStatus::Playing => return CommandOutcome::Ignored,
            PlaybackStatus::Preparing => {
                self.play_when_ready = true;
                return CommandOutcome::Deferred;
            }
            PlaybackStatus::Idle => {
                if self.unplayable || self.current_track().is_none() {
                    return CommandOutcome::Ignored;
                }
                self.load_track(true).await;
                self.publish_state();
                return CommandOutcome::Deferred;
            }
            PlaybackStatus::Paused => {}
        }

        if !self.focus.request().await.is_granted() {
            info!("Play refused, audio focus denied");
            self.emit(PlaybackEvent::FocusDenied {
                track_id: self.current_track().map(|track| track.id),
            });
            return CommandOutcome::Rejected(RejectReason::FocusDenied);
        }

        if let Err(e) = self.output.start().await {
            self.on_track_failed(e.to_string(), true).await;
            return CommandOutcome::Ignored;
        }

        self.status = PlaybackStatus::Playing;
        self.resume_on_focus_gain = false;
        self.ticker.start();
        self.publish_state();
        self.persist();
        CommandOutcome::Applied
    }

    /// `implicit` pauses come from focus loss and keep the focus request.
    async fn pause(&mut self, implicit: bool) -> CommandOutcome {
        match self.status {
            PlaybackStatus::Playing => {
                if let Err(e) = self.output.pause().await {
                    warn!(error = %e, "Audio output failed to pause");
                }
                self.refresh_position().await;
                self.ticker.stop();
                self.status = PlaybackStatus::Paused;

                if !implicit {
                    self.focus.abandon().await;
                    self.resume_on_focus_gain = false;
                }

                self.publish_state();
                self.persist();
                CommandOutcome::Applied
            }
            PlaybackStatus::Preparing if self.play_when_ready => {
                self.play_when_ready = false;
                self.publish_state();
                CommandOutcome::Applied
            }
            // Paused by a transient focus loss; an explicit pause cancels the pending resume.
            PlaybackStatus::Paused if !implicit && self.resume_on_focus_gain => {
                self.resume_on_focus_gain = false;
                self.focus.abandon().await;
                CommandOutcome::Applied
            }
            _ => CommandOutcome::Ignored,
        }
    }

    async fn stop(&mut self) -> CommandOutcome {
        if self.status == PlaybackStatus::Idle {
            return CommandOutcome::Ignored;
        }

        self.release_output().await;
        self.status = PlaybackStatus::Idle;
        self.position = Duration::ZERO;
        self.pending_seek = None;
        self.play_when_ready = false;
        self.focus.abandon().await;
        self.resume_on_focus_gain = false;

        info!("Playback stopped");
        self.publish_state();
        self.persist();
        CommandOutcome::Applied
    }

    async fn seek(&mut self, position: Duration) -> CommandOutcome {
        match self.status {
            PlaybackStatus::Idle => CommandOutcome::Ignored,
            PlaybackStatus::Preparing => {
                self.pending_seek = Some(position);
                self.position = position;
                self.publish_state();
                self.persist();
                CommandOutcome::Deferred
            }
            PlaybackStatus::Playing | PlaybackStatus::Paused => {
                let target = self.clamp_to_duration(position);
                if let Err(e) = self.output.seek(target).await {
                    warn!(error = %e, "Audio output failed to seek");
                    return CommandOutcome::Ignored;
                }
                self.position = target;
                self.emit_position();
                self.publish_state();
                self.persist();
                CommandOutcome::Applied
            }
        }
    }

    async fn skip(&mut self, direction: Direction) -> CommandOutcome {
        let Some(cursor) = self.cursor else {
            return CommandOutcome::Ignored;
        };
        let target = match direction {
            Direction::Forward => self.queue.next_position(cursor),
            Direction::Backward => self.queue.previous_position(cursor),
        };
        let Some(target) = target else {
            return CommandOutcome::Ignored;
        };

        self.cursor = Some(target);
        self.consecutive_failures = 0;
        self.load_track(true).await;
        self.announce_track();
        self.publish_state();
        self.persist();
        CommandOutcome::Applied
    }

    fn set_shuffle(&mut self, enabled: bool) -> CommandOutcome {
        let linear = self
            .cursor
            .and_then(|position| self.queue.linear_index(position));

        self.shuffle = enabled;
        if enabled {
            self.queue.shuffle(&mut self.rng);
        } else {
            self.queue.unshuffle();
        }
        self.cursor = linear.and_then(|index| self.queue.position_of(index));

        debug!(enabled, cursor = ?self.cursor, "Shuffle changed");
        self.publish_state();
        self.persist();
        CommandOutcome::Applied
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) -> CommandOutcome {
        self.repeat_mode = mode;
        debug!(?mode, "Repeat mode changed");
        self.publish_state();
        self.persist();
        CommandOutcome::Applied
    }

    async fn dispatch(&mut self, command: MediaCommand) -> CommandOutcome {
        debug!(%command, "Media command");
        match command {
            MediaCommand::SkipPrevious => self.skip(Direction::Backward).await,
            MediaCommand::SkipNext => self.skip(Direction::Forward).await,
            MediaCommand::Play => self.play().await,
            MediaCommand::Pause | MediaCommand::AudioBecomingNoisy => self.pause(false).await,
            MediaCommand::Close => {
                if self.status.is_playing() {
                    CommandOutcome::Rejected(RejectReason::Busy)
                } else {
                    self.stop().await
                }
            }
            MediaCommand::PlayPause => {
                let playing_or_about_to = self.status.is_playing()
                    || (self.status == PlaybackStatus::Preparing && self.play_when_ready);
                if playing_or_about_to {
                    self.pause(false).await
                } else {
                    self.play().await
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Output resource
    // ------------------------------------------------------------------

    /// Stop the clock, release the output and retire the current token.
    async fn release_output(&mut self) {
        self.ticker.stop();
        if let Err(e) = self.output.release().await {
            warn!(error = %e, "Failed to release audio output");
        }
        self.token = self.token.next();
        self.duration = None;
    }

    /// Prepare the track under the cursor.
    async fn load_track(&mut self, autoplay: bool) {
        self.release_output().await;
        self.position = Duration::ZERO;
        self.pending_seek = None;
        self.unplayable = false;
        self.play_when_ready = autoplay;

        let Some(track) = self.current_track().cloned() else {
            self.status = PlaybackStatus::Idle;
            return;
        };

        info!(
            track_id = %track.id,
            file = %redact_locator(&track.locator),
            token = %self.token,
            "Preparing track"
        );
        self.status = PlaybackStatus::Preparing;

        let request = LoadRequest::new(self.token, track.source());
        if let Err(e) = self.output.load(request).await {
            self.internal
                .send(Internal::LoadFailed {
                    token: self.token,
                    message: e.to_string(),
                })
                .ok();
        }
    }

    async fn refresh_position(&mut self) {
        match self.output.position().await {
            Ok(position) => self.position = position,
            Err(e) => trace!(error = %e, "Position unavailable"),
        }
    }

    fn clamp_to_duration(&self, position: Duration) -> Duration {
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    // ------------------------------------------------------------------
    // Asynchronous inputs
    // ------------------------------------------------------------------

    async fn on_output_event(&mut self, event: OutputEvent) {
        if event.token() != self.token {
            trace!(event_token = %event.token(), current = %self.token, "Ignoring stale output event");
            return;
        }

        match event {
            OutputEvent::Prepared { duration, .. } => self.on_prepared(duration).await,
            OutputEvent::PrepareFailed { message, .. } => {
                let resume = self.play_when_ready;
                self.on_track_failed(message, resume).await;
            }
            OutputEvent::Failed { message, .. } => {
                let resume = self.status.is_playing() || self.play_when_ready;
                self.on_track_failed(message, resume).await;
            }
            OutputEvent::Completed { .. } => self.on_completed().await,
        }
    }

    async fn on_prepared(&mut self, duration: Option<Duration>) {
        if self.status != PlaybackStatus::Preparing {
            return;
        }

        self.duration = duration;
        self.status = PlaybackStatus::Paused;
        self.consecutive_failures = 0;
        debug!(duration = ?duration, "Track prepared");

        if let Some(target) = self.pending_seek.take() {
            let target = self.clamp_to_duration(target);
            match self.output.seek(target).await {
                Ok(()) => self.position = target,
                Err(e) => warn!(error = %e, "Failed to apply pending seek"),
            }
        }

        if std::mem::take(&mut self.play_when_ready) && self.play().await.is_accepted() {
            return;
        }

        self.publish_state();
        self.persist();
    }

    async fn on_track_failed(&mut self, message: String, resume: bool) {
        let track_id = self.current_track().map(|track| track.id);
        let was_playing = self.status.is_playing();

        self.release_output().await;
        self.status = PlaybackStatus::Idle;
        self.unplayable = true;
        self.play_when_ready = false;
        self.pending_seek = None;
        self.position = Duration::ZERO;
        self.consecutive_failures += 1;

        let skip = self.config.skip_unplayable && self.consecutive_failures < self.queue.len();
        warn!(track_id = ?track_id, error = %message, skip, "Track unplayable");

        if let Some(track_id) = track_id {
            self.emit(PlaybackEvent::TrackUnplayable {
                track_id,
                message,
                skipped: skip,
            });
        }

        let next = self
            .cursor
            .and_then(|position| self.queue.next_position(position));
        match next {
            Some(next) if skip => {
                self.cursor = Some(next);
                self.load_track(resume).await;
                self.announce_track();
            }
            _ => {
                if was_playing || resume {
                    self.focus.abandon().await;
                    self.resume_on_focus_gain = false;
                }
            }
        }

        self.publish_state();
        self.persist();
    }

    async fn on_completed(&mut self) {
        if !self.status.is_playing() {
            return;
        }

        if let Some(track_id) = self.current_track().map(|track| track.id) {
            info!(%track_id, repeat = ?self.repeat_mode, "Track completed");
            self.emit(PlaybackEvent::Completed { track_id });
        }

        match self.repeat_mode {
            RepeatMode::All => {
                self.skip(Direction::Forward).await;
            }
            RepeatMode::One => {
                self.ticker.stop();
                let restarted = match self.output.seek(Duration::ZERO).await {
                    Ok(()) => self.output.start().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = restarted {
                    self.on_track_failed(e.to_string(), true).await;
                    return;
                }

                self.position = Duration::ZERO;
                self.ticker.start();
                self.emit_position();
                self.publish_state();
                self.persist();
            }
            RepeatMode::None => {
                self.release_output().await;
                self.status = PlaybackStatus::Idle;
                self.position = Duration::ZERO;
                self.play_when_ready = false;
                self.focus.abandon().await;
                self.resume_on_focus_gain = false;
                self.publish_state();
                self.persist();
            }
        }
    }

    async fn on_focus_change(&mut self, change: FocusChange) {
        if !self.focus.on_change(change) {
            trace!(?change, "Focus change without a grant");
            return;
        }

        match change {
            FocusChange::LostTransient => match self.status {
                PlaybackStatus::Playing => {
                    self.pause(true).await;
                    self.resume_on_focus_gain = true;
                }
                PlaybackStatus::Preparing if self.play_when_ready => {
                    self.play_when_ready = false;
                    self.resume_on_focus_gain = true;
                    self.publish_state();
                }
                _ => {}
            },
            FocusChange::LostPermanent => {
                self.resume_on_focus_gain = false;
                match self.status {
                    PlaybackStatus::Playing => {
                        self.pause(false).await;
                    }
                    PlaybackStatus::Preparing if self.play_when_ready => {
                        self.play_when_ready = false;
                        self.publish_state();
                    }
                    _ => {}
                }
            }
            FocusChange::Gained => {
                if std::mem::take(&mut self.resume_on_focus_gain) {
                    debug!("Resuming after transient focus loss");
                    self.play().await;
                }
            }
        }
    }

    async fn on_tick(&mut self, tick: Tick) {
        if !self.ticker.is_current(tick) || !self.status.is_playing() {
            trace!(run_id = tick.run_id, "Dropping stale tick");
            return;
        }

        self.refresh_position().await;
        self.emit_position();
        self.persist();
    }

    async fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::LoadFailed { token, message } => {
                if token == self.token {
                    let resume = self.play_when_ready;
                    self.on_track_failed(message, resume).await;
                }
            }
            Internal::RestoreLoaded(result) => self.finish_restore(result).await,
        }
    }

    // ------------------------------------------------------------------
    // Session restore
    // ------------------------------------------------------------------

    fn begin_restore(&mut self, reply: oneshot::Sender<CommandOutcome>) {
        if !self.config.persist_session {
            self.emit_session(SessionEvent::RestoreSkipped {
                reason: "session persistence disabled".to_string(),
            });
            let _ = reply.send(CommandOutcome::Ignored);
            return;
        }

        if self.restore_started {
            let _ = reply.send(CommandOutcome::Ignored);
            return;
        }

        self.restore_started = true;
        self.restore_reply = Some(reply);

        let settings = Arc::clone(&self.settings);
        let catalog = Arc::clone(&self.catalog);
        let internal = self.internal.clone();
        tokio::spawn(async move {
            let result = plan_restore(settings.as_ref(), catalog.as_ref()).await;
            internal.send(Internal::RestoreLoaded(result)).ok();
        });
    }

    async fn finish_restore(&mut self, result: Result<RestoreOutcome>) {
        let reply = self.restore_reply.take();

        let outcome = match result {
            Err(e) => {
                warn!(error = %e, "Session restore failed");
                self.skip_restore(e.to_string())
            }
            Ok(RestoreOutcome::Skipped(reason)) => self.skip_restore(reason),
            Ok(RestoreOutcome::Ready(_)) if self.cursor.is_some() => {
                let outcome =
                    self.skip_restore("a queue was loaded before the session was read".to_string());
                self.persist();
                outcome
            }
            Ok(RestoreOutcome::Ready(plan)) => self.apply_restore(plan).await,
        };

        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn skip_restore(&self, reason: String) -> CommandOutcome {
        info!(%reason, "Session not restored");
        self.emit_session(SessionEvent::RestoreSkipped { reason });
        CommandOutcome::Ignored
    }

    async fn apply_restore(&mut self, plan: RestorePlan) -> CommandOutcome {
        let track_id = plan.current_track_id();
        let RestorePlan {
            tracks,
            start_index,
            position,
            repeat_mode,
            shuffle,
            dropped,
        } = plan;
        let queue_len = tracks.len();

        self.load_queue(tracks, start_index).await;
        if !position.is_zero() {
            self.seek(position).await;
        }
        self.set_shuffle(shuffle);
        self.set_repeat_mode(repeat_mode);

        if let Some(track_id) = track_id {
            info!(%track_id, queue_len, dropped, "Session restored");
            self.emit_session(SessionEvent::Restored {
                track_id,
                queue_len,
                dropped,
            });
        }
        CommandOutcome::Applied
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    fn current_track(&self) -> Option<&Track> {
        self.cursor.and_then(|position| self.queue.get(position))
    }

    fn state(&self) -> PlayerState {
        PlayerState {
            status: self.status,
            current_track: self.current_track().cloned(),
            position_ms: self.position.as_millis() as u64,
            duration_ms: self.duration.map(|duration| duration.as_millis() as u64),
            shuffle: self.shuffle,
            repeat_mode: self.repeat_mode,
            cursor: self.cursor,
            queue_len: self.queue.len(),
            unplayable: self.unplayable,
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }

    fn emit_session(&self, event: SessionEvent) {
        self.events.emit(CoreEvent::Session(event)).ok();
    }

    fn publish_state(&self) {
        self.emit(PlaybackEvent::StateChanged {
            state: self.state(),
        });
    }

    fn announce_track(&self) {
        let (Some(cursor), Some(track)) = (self.cursor, self.current_track()) else {
            return;
        };
        self.emit(PlaybackEvent::TrackChanged {
            track: track.clone(),
            cursor,
            queue_len: self.queue.len(),
        });
    }

    fn emit_position(&self) {
        if let Some(track) = self.current_track() {
            self.emit(PlaybackEvent::PositionChanged {
                track_id: track.id,
                position_ms: self.position.as_millis() as u64,
                duration_ms: self.duration.unwrap_or_default().as_millis() as u64,
            });
        }
    }

    /// Hand the current session to the writer.
    ///
    /// Suppressed while a restore is reading the stored session and until a
    /// queue has been loaded, so a session that was not restored survives.
    fn persist(&self) {
        let Some(session) = &self.session else {
            return;
        };
        if self.restore_reply.is_some() || self.queue.is_empty() {
            return;
        }

        session.save(SessionSnapshot {
            current_track: self.current_track().map(|track| track.id),
            position: self.position,
            queue: self.queue.track_ids(),
            repeat_mode: self.repeat_mode,
            shuffle: self.shuffle,
        });
    }

    async fn shutdown(&mut self) {
        if self.status.is_playing() {
            self.refresh_position().await;
        }
        self.persist();

        self.release_output().await;
        self.focus.abandon().await;
        self.status = PlaybackStatus::Idle;
        self.play_when_ready = false;
        self.resume_on_focus_gain = false;
        self.publish_state();

        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}
