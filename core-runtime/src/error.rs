use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors raised while assembling the core.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value or a logging subscriber already installed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge was neither injected nor provided by the desktop shims.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A default bridge failed to open.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
