//! Errors raised while assembling the runtime around a player.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A host bridge the player cannot run without was not provided.
    #[error("Missing bridge {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },

    /// The global tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// The player was created outside of a Tokio runtime.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
