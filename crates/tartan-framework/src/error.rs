//! Error types for the tartan framework.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::action::ActionId;
use crate::schedule::ScheduleError;

/// Errors raised while loading and registering plugins.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// A configurable plugin has no configuration section.
    #[error("missing configuration key '{path}'")]
    MissingConfig {
        /// Key path of the missing section, e.g. `plugins.karma`.
        path: String,
    },

    /// The configuration section does not have the expected shape.
    #[error("invalid configuration at '{path}': {message}")]
    InvalidConfig {
        /// Key path of the section.
        path: String,
        /// Deserializer message.
        message: String,
    },

    /// Two plugins share a name.
    #[error("plugin '{name}' is already registered")]
    Duplicate {
        /// The clashing name.
        name: String,
    },

    /// The name belongs to the built-in help and default actions.
    #[error("plugin name '{name}' is reserved")]
    Reserved {
        /// The reserved name.
        name: String,
    },

    /// A scheduled action has an invalid schedule.
    #[error("plugin '{plugin}' scheduled action {index}: {source}")]
    InvalidSchedule {
        /// Owning plugin.
        plugin: String,
        /// Position of the scheduled action.
        index: usize,
        /// What is wrong with it.
        #[source]
        source: ScheduleError,
    },

    /// The plugin's own initialization failed.
    #[error("plugin '{plugin}' failed to initialize: {message}")]
    Init {
        /// Plugin name.
        plugin: String,
        /// Failure description.
        message: String,
    },
}

impl PluginError {
    /// Creates an initialization error.
    pub fn init(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Init {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Phase of an action during which a panic happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicStage {
    /// Inside the predicate.
    Matching,
    /// Inside the answerer.
    Answering,
}

impl fmt::Display for PanicStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Matching => "matching",
            Self::Answering => "answering",
        })
    }
}

/// A plugin action panicked; the panic was contained.
#[derive(Debug, Clone, Error)]
#[error("action {action} panicked while {stage}: {message}")]
pub struct ActionPanic {
    /// The action that panicked.
    pub action: ActionId,
    /// Where it panicked.
    pub stage: PanicStage,
    /// Panic payload, when it was a string.
    pub message: String,
}

impl ActionPanic {
    pub(crate) fn from_payload(
        action: ActionId,
        stage: PanicStage,
        payload: Box<dyn Any + Send>,
    ) -> Self {
        Self {
            action,
            stage,
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
