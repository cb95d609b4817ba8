//! # Tartan Framework
//!
//! The plugin model of the tartan chat-bot engine.
//!
//! This layer provides:
//! - Actions: commands, hear actions and scheduled actions
//! - Plugins, their descriptors and load contexts
//! - The plugin registry, namespacing and the built-in help command
//! - Schedules evaluated in a configurable time zone
//! - The key/value storage contract stateful plugins use
//!
//! It knows nothing about queues, workers or the chat driver; the runtime
//! crate drives it.

pub mod action;
pub mod error;
pub mod help;
pub mod plugin;
pub mod registry;
pub mod schedule;

pub use action::{ActionDefinition, ActionId, ActionKind, ScheduledAction};
pub use error::{ActionPanic, PanicStage, PluginError, PluginResult, panic_message};
pub use help::{DEFAULT_REPLY, default_answer};
pub use plugin::{
    BoxedStorer, MemoryStorer, Plugin, PluginDescriptor, PluginLoadContext, PluginLogger,
    StringStorer,
};
pub use registry::{
    Evaluation, MessageContext, PluginRegistry, RegisteredAction, RegisteredSchedule,
    RegistryBuilder,
};
pub use schedule::{Schedule, ScheduleError, TimeLocation, TimeUnit};

/// Prelude for plugin authors.
pub mod prelude {
    pub use super::action::*;
    pub use super::error::*;
    pub use super::plugin::*;
    pub use super::registry::*;
    pub use super::schedule::*;
}
