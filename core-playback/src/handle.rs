//! Cloneable front door to the playback engine.

use crate::command::{CommandOutcome, MediaCommand};
use crate::engine::{Command, Request};
use crate::error::{PlaybackError, Result};
use bridge_traits::playback::RepeatMode;
use core_library::models::Track;
use core_runtime::events::PlayerState;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Sends commands to a running [`PlaybackEngine`](crate::PlaybackEngine).
///
/// Every call is answered once the engine has applied the command, so
/// commands issued from one task are observed in issue order. Once the engine
/// has stopped every call fails with [`PlaybackError::EngineStopped`].
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
}

impl PlayerHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    async fn request(&self, request: Request) -> Result<CommandOutcome> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Request { request, reply })
            .await
            .map_err(|_| PlaybackError::EngineStopped)?;
        response.await.map_err(|_| PlaybackError::EngineStopped)
    }

    /// Replace the queue and prepare `tracks[start_index]` without starting it.
    pub async fn load_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<CommandOutcome> {
        self.request(Request::LoadQueue {
            tracks,
            start_index,
        })
        .await
    }

    pub async fn play(&self) -> Result<CommandOutcome> {
        self.request(Request::Play).await
    }

    pub async fn pause(&self) -> Result<CommandOutcome> {
        self.request(Request::Pause).await
    }

    pub async fn stop(&self) -> Result<CommandOutcome> {
        self.request(Request::Stop).await
    }

    pub async fn seek(&self, position: Duration) -> Result<CommandOutcome> {
        self.request(Request::Seek(position)).await
    }

    /// Seek by a signed millisecond offset from the start; negatives clamp to zero.
    pub async fn seek_ms(&self, position_ms: i64) -> Result<CommandOutcome> {
        let position = Duration::from_millis(position_ms.max(0) as u64);
        self.seek(position).await
    }

    pub async fn next(&self) -> Result<CommandOutcome> {
        self.request(Request::Next).await
    }

    pub async fn previous(&self) -> Result<CommandOutcome> {
        self.request(Request::Previous).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<CommandOutcome> {
        self.request(Request::SetShuffle(enabled)).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<CommandOutcome> {
        self.request(Request::SetRepeatMode(mode)).await
    }

    /// Advance the repeat mode `None -> One -> All -> None`.
    pub async fn cycle_repeat_mode(&self) -> Result<CommandOutcome> {
        self.request(Request::CycleRepeatMode).await
    }

    /// `true` behaves like [`play`](Self::play), `false` like [`pause`](Self::pause).
    pub async fn set_playing(&self, playing: bool) -> Result<CommandOutcome> {
        self.request(Request::SetPlaying(playing)).await
    }

    pub async fn dispatch(&self, command: MediaCommand) -> Result<CommandOutcome> {
        self.request(Request::Dispatch(command)).await
    }

    /// Dispatch a host media action string such as `"PLAY_PAUSE"`.
    pub async fn dispatch_action(&self, action: &str) -> Result<CommandOutcome> {
        let command = action.parse::<MediaCommand>().map_err(|e| {
            warn!(action, "Ignoring unknown media action");
            e
        })?;
        self.dispatch(command).await
    }

    /// Restore the last saved session. Answers once the restore has finished.
    pub async fn restore(&self) -> Result<CommandOutcome> {
        self.request(Request::Restore).await
    }

    /// Snapshot of the engine's current state.
    pub async fn state(&self) -> Result<PlayerState> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::State { reply })
            .await
            .map_err(|_| PlaybackError::EngineStopped)?;
        response.await.map_err(|_| PlaybackError::EngineStopped)
    }

    /// Release the output, save the session and stop the engine.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| PlaybackError::EngineStopped)?;
        response.await.map_err(|_| PlaybackError::EngineStopped)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
