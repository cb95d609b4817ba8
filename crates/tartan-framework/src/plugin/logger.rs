use std::fmt;
use std::sync::Arc;

use tartan_core::SLogger;
use tracing::{debug, info};

/// [`SLogger`] handed to a plugin, tagging every line with its name.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin: Arc<str>,
    debug: bool,
}

impl PluginLogger {
    /// Creates a logger for `plugin`. `debugf` is silent unless `debug`.
    pub fn new(plugin: impl Into<Arc<str>>, debug: bool) -> Self {
        Self {
            plugin: plugin.into(),
            debug,
        }
    }

    /// Whether `debugf` emits anything.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }
}

impl SLogger for PluginLogger {
    fn printf(&self, args: fmt::Arguments<'_>) {
        info!(plugin = %self.plugin, "{}", args);
    }

    fn debugf(&self, args: fmt::Arguments<'_>) {
        if self.debug {
            debug!(plugin = %self.plugin, "{}", args);
        }
    }
}
