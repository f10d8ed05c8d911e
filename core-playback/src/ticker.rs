//! Position clock that runs while audio renders.
//!
//! The ticker never touches engine state itself: it posts [`Tick`]s into a
//! channel the engine drains alongside its commands. Every run gets a fresh
//! id, so a tick that was already in flight when the ticker stopped is
//! recognisably stale.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub run_id: u64,
}

struct Run {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct PositionTicker {
    interval: Duration,
    sender: mpsc::Sender<Tick>,
    run_id: u64,
    run: Option<Run>,
}

impl PositionTicker {
    /// Create a stopped ticker and the receiver its ticks arrive on.
    ///
    /// The channel holds a single tick; a tick produced while the previous
    /// one is still unhandled is dropped rather than queued.
    pub fn new(interval: Duration) -> (Self, mpsc::Receiver<Tick>) {
        let (sender, receiver) = mpsc::channel(1);
        let ticker = Self {
            interval,
            sender,
            run_id: 0,
            run: None,
        };
        (ticker, receiver)
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Whether `tick` belongs to the current, still active run.
    pub fn is_current(&self, tick: Tick) -> bool {
        self.run.is_some() && tick.run_id == self.run_id
    }

    /// Start a new run. A run already in progress is replaced.
    pub fn start(&mut self) {
        self.stop();
        self.run_id += 1;

        let run_id = self.run_id;
        let cancel = CancellationToken::new();
        let sender = self.sender.clone();
        let period = self.interval;
        let stopped = cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stopped.cancelled() => break,
                    _ = interval.tick() => {
                        if sender.try_send(Tick { run_id }).is_err() && sender.is_closed() {
                            break;
                        }
                    }
                }
            }
            trace!(run_id, "Position ticker finished");
        });

        self.run = Some(Run { cancel, task });
    }

    /// Stop the current run; no tick of it is accepted afterwards.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
            run.task.abort();
        }
    }
}

impl Drop for PositionTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
