//! Audio focus bookkeeping on top of the host [`AudioFocusProvider`].
//!
//! The provider talks to the platform; the arbiter remembers whether this
//! player currently holds focus so redundant requests and abandons never
//! reach the platform.

use bridge_traits::focus::{AudioFocusProvider, FocusChange, FocusGrant};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Focus as seen by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    /// No outstanding grant.
    #[default]
    Released,
    /// Granted and not interrupted.
    Held,
    /// Granted, but another app interrupted temporarily.
    Suspended,
}

pub struct AudioFocusArbiter {
    provider: Arc<dyn AudioFocusProvider>,
    state: FocusState,
}

impl AudioFocusArbiter {
    pub fn new(provider: Arc<dyn AudioFocusProvider>) -> Self {
        Self {
            provider,
            state: FocusState::Released,
        }
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state == FocusState::Held
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FocusChange> {
        self.provider.subscribe()
    }

    /// Ask for focus. A provider failure counts as a denial.
    pub async fn request(&mut self) -> FocusGrant {
        if self.state == FocusState::Held {
            return FocusGrant::Granted;
        }

        let grant = match self.provider.request().await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Audio focus request failed");
                FocusGrant::Denied
            }
        };

        if grant.is_granted() {
            self.state = FocusState::Held;
        }
        debug!(?grant, "Audio focus requested");
        grant
    }

    pub async fn abandon(&mut self) {
        if self.state == FocusState::Released {
            return;
        }

        if let Err(e) = self.provider.abandon().await {
            warn!(error = %e, "Audio focus abandon failed");
        }
        self.state = FocusState::Released;
        debug!("Audio focus abandoned");
    }

    /// Track a platform focus change.
    ///
    /// Returns `false` when the change does not concern a grant this player
    /// holds (e.g. a gain while released) and should be ignored.
    pub fn on_change(&mut self, change: FocusChange) -> bool {
        let next = match (self.state, change) {
            (FocusState::Released, _) => return false,
            (_, FocusChange::LostPermanent) => FocusState::Released,
            (FocusState::Held, FocusChange::LostTransient) => FocusState::Suspended,
            (FocusState::Suspended, FocusChange::Gained) => FocusState::Held,
            (state, _) => state,
        };
        debug!(from = ?self.state, to = ?next, ?change, "Audio focus changed");
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result};
    use mockall::mock;

    mock! {
        Provider {}

        #[async_trait]
        impl AudioFocusProvider for Provider {
            async fn request(&self) -> Result<FocusGrant>;
            async fn abandon(&self) -> Result<()>;
            fn subscribe(&self) -> broadcast::Receiver<FocusChange>;
        }
    }

    #[tokio::test]
    async fn request_while_held_does_not_reach_provider() {
        let mut provider = MockProvider::new();
        provider
            .expect_request()
            .times(1)
            .returning(|| Ok(FocusGrant::Granted));

        let mut arbiter = AudioFocusArbiter::new(Arc::new(provider));
        assert_eq!(arbiter.request().await, FocusGrant::Granted);
        assert_eq!(arbiter.request().await, FocusGrant::Granted);
        assert!(arbiter.is_held());
    }

    #[tokio::test]
    async fn abandon_while_released_is_a_no_op() {
        let mut provider = MockProvider::new();
        provider.expect_abandon().never();

        let mut arbiter = AudioFocusArbiter::new(Arc::new(provider));
        arbiter.abandon().await;
        assert_eq!(arbiter.state(), FocusState::Released);
    }

    #[tokio::test]
    async fn provider_errors_count_as_denied() {
        let mut provider = MockProvider::new();
        provider
            .expect_request()
            .returning(|| Err(BridgeError::NotAvailable("audio service".into())));

        let mut arbiter = AudioFocusArbiter::new(Arc::new(provider));
        assert_eq!(arbiter.request().await, FocusGrant::Denied);
        assert_eq!(arbiter.state(), FocusState::Released);
    }

    #[tokio::test]
    async fn transient_loss_suspends_until_gain() {
        let mut provider = MockProvider::new();
        provider
            .expect_request()
            .returning(|| Ok(FocusGrant::Granted));

        let mut arbiter = AudioFocusArbiter::new(Arc::new(provider));
        arbiter.request().await;

        assert!(arbiter.on_change(FocusChange::LostTransient));
        assert_eq!(arbiter.state(), FocusState::Suspended);

        assert!(arbiter.on_change(FocusChange::Gained));
        assert_eq!(arbiter.state(), FocusState::Held);

        assert!(arbiter.on_change(FocusChange::LostPermanent));
        assert_eq!(arbiter.state(), FocusState::Released);
        assert!(!arbiter.on_change(FocusChange::Gained));
    }
}
