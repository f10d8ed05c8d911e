//! Audio focus bridge.
//!
//! Audio focus is the device-level right to render audio, arbitrated between
//! applications. Android exposes it through `AudioManager`, iOS through
//! `AVAudioSession` interruptions; desktop hosts usually arbitrate only between
//! clients of the same process.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Result of a focus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusGrant {
    Granted,
    Denied,
}

impl FocusGrant {
    pub fn is_granted(self) -> bool {
        matches!(self, FocusGrant::Granted)
    }
}

/// Focus change pushed by the platform after a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusChange {
    /// Another application needs brief priority; playback is expected to resume.
    LostTransient,
    /// Another application took over; only an explicit play may resume.
    LostPermanent,
    /// Focus came back after a transient loss.
    Gained,
}

/// Platform focus arbitration.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::focus::{AudioFocusProvider, FocusGrant};
///
/// async fn start(provider: &dyn AudioFocusProvider) -> Result<bool> {
///     Ok(provider.request().await? == FocusGrant::Granted)
/// }
/// ```
#[async_trait::async_trait]
pub trait AudioFocusProvider: Send + Sync {
    /// Ask for exclusive rendering rights.
    async fn request(&self) -> Result<FocusGrant>;

    /// Give up a previously granted request.
    async fn abandon(&self) -> Result<()>;

    /// Subscribe to focus changes delivered after a grant.
    fn subscribe(&self) -> broadcast::Receiver<FocusChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_helpers() {
        assert!(FocusGrant::Granted.is_granted());
        assert!(!FocusGrant::Denied.is_granted());
    }

    #[test]
    fn focus_change_serializes_by_name() {
        let json = serde_json::to_string(&FocusChange::LostTransient).unwrap();
        assert_eq!(json, "\"LostTransient\"");
    }
}
