//! Configuration module for the tartan runtime.
//!
//! Layered loading with figment, a flat camelCase schema and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig, TartanConfig};
pub use validation::validate_config;
