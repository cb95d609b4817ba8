//! Runtime error types.

use tartan_framework::PluginError;
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};
pub use crate::engine::router::RouterError;

/// Errors that can occur while building or running the engine.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A plugin failed to load or register.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// The partition router could not be built.
    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    /// A required capability was not supplied to the builder.
    #[error("Missing capability: {0}")]
    MissingCapability(&'static str),

    /// The remote service rejected the credentials.
    #[error("Authentication rejected by the remote service")]
    InvalidAuth,

    /// `run` was called on an engine that already ran.
    #[error("Engine has already been started")]
    AlreadyStarted,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
