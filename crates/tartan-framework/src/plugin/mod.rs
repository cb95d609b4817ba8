//! Plugin system.
//!
//! - [`Plugin`]: a named bundle of actions with an optional shutdown hook.
//! - [`PluginDescriptor`]: a static factory that builds a plugin from its
//!   [`PluginLoadContext`] (configuration, capabilities, logger, storage).
//! - [`PluginLogger`]: the [`SLogger`](tartan_core::SLogger) plugins receive.
//! - [`StringStorer`]: the key/value contract stateful plugins rely on.

mod core;
mod descriptor;
mod logger;
pub mod storage;

pub use self::core::{CloseFn, Plugin};
pub use descriptor::{PluginDescriptor, PluginFactory, PluginLoadContext};
pub use logger::PluginLogger;
pub use storage::{BoxedStorer, MemoryStorer, StringStorer};
