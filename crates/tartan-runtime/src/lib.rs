//! Tartan Runtime - the engine that drives tartan plugins.
//!
//! This crate provides:
//! - The partitioned, ordered message dispatcher and its workers
//! - Response tracking for edit and delete reconciliation
//! - The scheduled-action runner
//! - An ARC cache in front of the user directory
//! - Configuration loading and logging setup
//! - Runtime assembly (`TartanRuntime`, `RuntimeBuilder`)
//!
//! The chat service itself stays outside: the host supplies a stream of
//! [`RtmEvent`](tartan_core::RtmEvent)s and the capability implementations.
//!
//! ```ignore
//! use tartan_runtime::TartanRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = TartanRuntime::builder()
//!         .chat_driver(driver)
//!         .user_info_finder(directory)
//!         .emoji_reactor(reactor)
//!         .file_uploader(uploader)
//!         .real_time_sender(sender)
//!         .plugin_instance(my_plugin())
//!         .build()?;
//!
//!     // Run until the stream ends, the service terminates us, or Ctrl+C
//!     runtime.run_until_signal(events).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use cache::ArcCache;
pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, TartanConfig};
pub use engine::{EngineStats, ResponseEntry, ResponseTracker, RouterError, partition_for};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, ShutdownHandle, TartanRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
