//! In-process audio focus arbitration.
//!
//! Desktop platforms have no system-wide focus manager, so the arbiter keeps
//! a holder stack for the clients living in this process (the player, a
//! notification chime, a voice call...). The newest holder renders; older
//! holders are told whether they lost focus for good or only until the newer
//! transient holder lets go.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    focus::{AudioFocusProvider, FocusChange, FocusGrant},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 16;

/// How long a client intends to keep focus once granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusKind {
    /// Long-lived playback; displaces every current holder for good.
    Permanent,
    /// Short interruption; the previous holder gets focus back afterwards.
    Transient,
}

struct Holder {
    id: u64,
    events: broadcast::Sender<FocusChange>,
}

#[derive(Default)]
struct ArbiterState {
    holders: Vec<Holder>,
    locked: bool,
    next_id: u64,
}

impl ArbiterState {
    fn position(&self, id: u64) -> Option<usize> {
        self.holders.iter().position(|holder| holder.id == id)
    }

    fn is_top(&self, id: u64) -> bool {
        self.holders.last().is_some_and(|holder| holder.id == id)
    }

    /// Remove a holder, handing focus back to the next one if it was on top.
    fn release(&mut self, id: u64) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        let was_top = index + 1 == self.holders.len();
        self.holders.remove(index);

        if was_top {
            if let Some(top) = self.holders.last() {
                let _ = top.events.send(FocusChange::Gained);
            }
        }
        true
    }
}

/// Shared focus arbiter; hand one [`LocalFocusClient`] to each audio producer.
#[derive(Clone, Default)]
pub struct LocalFocusArbiter {
    state: Arc<Mutex<ArbiterState>>,
}

impl LocalFocusArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client that will request focus of the given kind.
    pub fn client(&self, kind: FocusKind) -> LocalFocusClient {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            state.next_id
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        LocalFocusClient {
            id,
            kind,
            state: Arc::clone(&self.state),
            events,
        }
    }

    /// While locked every request is denied (e.g. during a call).
    pub fn set_locked(&self, locked: bool) {
        self.state.lock().locked = locked;
    }

    pub fn holder_count(&self) -> usize {
        self.state.lock().holders.len()
    }
}

/// One producer's view of the [`LocalFocusArbiter`].
pub struct LocalFocusClient {
    id: u64,
    kind: FocusKind,
    state: Arc<Mutex<ArbiterState>>,
    events: broadcast::Sender<FocusChange>,
}

impl LocalFocusClient {
    pub fn holds_focus(&self) -> bool {
        self.state.lock().is_top(self.id)
    }
}

#[async_trait]
impl AudioFocusProvider for LocalFocusClient {
    async fn request(&self) -> Result<FocusGrant> {
        let mut state = self.state.lock();

        if state.locked {
            debug!(client = self.id, "Focus request denied, arbiter locked");
            return Ok(FocusGrant::Denied);
        }

        if state.is_top(self.id) {
            return Ok(FocusGrant::Granted);
        }

        if let Some(index) = state.position(self.id) {
            state.holders.remove(index);
        }

        match self.kind {
            FocusKind::Transient => {
                if let Some(top) = state.holders.last() {
                    let _ = top.events.send(FocusChange::LostTransient);
                }
            }
            FocusKind::Permanent => {
                for holder in state.holders.drain(..) {
                    let _ = holder.events.send(FocusChange::LostPermanent);
                }
            }
        }

        state.holders.push(Holder {
            id: self.id,
            events: self.events.clone(),
        });
        debug!(client = self.id, kind = ?self.kind, "Focus granted");

        Ok(FocusGrant::Granted)
    }

    async fn abandon(&self) -> Result<()> {
        if self.state.lock().release(self.id) {
            debug!(client = self.id, "Focus abandoned");
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FocusChange> {
        self.events.subscribe()
    }
}

impl Drop for LocalFocusClient {
    fn drop(&mut self) {
        self.state.lock().release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transient_interruption_suspends_and_restores_previous_holder() {
        let arbiter = LocalFocusArbiter::new();
        let player = arbiter.client(FocusKind::Permanent);
        let chime = arbiter.client(FocusKind::Transient);
        let mut player_events = player.subscribe();

        assert_eq!(player.request().await.unwrap(), FocusGrant::Granted);
        assert_eq!(chime.request().await.unwrap(), FocusGrant::Granted);
        assert_eq!(player_events.recv().await.unwrap(), FocusChange::LostTransient);
        assert!(!player.holds_focus());

        chime.abandon().await.unwrap();
        assert_eq!(player_events.recv().await.unwrap(), FocusChange::Gained);
        assert!(player.holds_focus());
    }

    #[tokio::test]
    async fn permanent_request_displaces_holders() {
        let arbiter = LocalFocusArbiter::new();
        let player = arbiter.client(FocusKind::Permanent);
        let other = arbiter.client(FocusKind::Permanent);
        let mut player_events = player.subscribe();

        player.request().await.unwrap();
        other.request().await.unwrap();

        assert_eq!(player_events.recv().await.unwrap(), FocusChange::LostPermanent);
        assert_eq!(arbiter.holder_count(), 1);

        // Nothing to hand back once the player was displaced.
        other.abandon().await.unwrap();
        assert!(player_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn repeated_request_and_abandon_are_no_ops() {
        let arbiter = LocalFocusArbiter::new();
        let player = arbiter.client(FocusKind::Permanent);

        player.abandon().await.unwrap();
        assert_eq!(arbiter.holder_count(), 0);

        player.request().await.unwrap();
        player.request().await.unwrap();
        assert_eq!(arbiter.holder_count(), 1);
    }

    #[tokio::test]
    async fn locked_arbiter_denies_requests() {
        let arbiter = LocalFocusArbiter::new();
        let player = arbiter.client(FocusKind::Permanent);

        arbiter.set_locked(true);
        assert_eq!(player.request().await.unwrap(), FocusGrant::Denied);

        arbiter.set_locked(false);
        assert_eq!(player.request().await.unwrap(), FocusGrant::Granted);
    }

    #[tokio::test]
    async fn dropping_a_transient_holder_returns_focus() {
        let arbiter = LocalFocusArbiter::new();
        let player = arbiter.client(FocusKind::Permanent);
        let mut player_events = player.subscribe();
        player.request().await.unwrap();

        {
            let chime = arbiter.client(FocusKind::Transient);
            chime.request().await.unwrap();
        }

        assert_eq!(player_events.recv().await.unwrap(), FocusChange::LostTransient);
        assert_eq!(player_events.recv().await.unwrap(), FocusChange::Gained);
    }
}
