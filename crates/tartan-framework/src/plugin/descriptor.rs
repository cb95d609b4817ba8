use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tartan_core::{BoxedLogger, Capabilities};
use tracing::warn;

use super::core::Plugin;
use super::storage::BoxedStorer;
use crate::error::{PluginError, PluginResult};

// ─── PluginLoadContext ────────────────────────────────────────────────────────

/// Context passed to a plugin factory.
///
/// Gives access to the plugin's `plugins.<name>` configuration section, the
/// shared capabilities, a plugin-scoped logger and, when the host provides
/// one, a key/value store.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(serde::Deserialize)]
/// struct KarmaConfig { max_per_message: u32 }
///
/// fn karma(ctx: &PluginLoadContext) -> PluginResult<Plugin> {
///     let cfg: KarmaConfig = ctx.get_config()?;
///     ctx.logger().printf(format_args!("max karma per message: {}", cfg.max_per_message));
///     Ok(Plugin::new("karma"))
/// }
/// ```
#[derive(Clone)]
pub struct PluginLoadContext {
    plugin_name: Arc<str>,
    plugin_config: Option<Arc<serde_json::Value>>,
    capabilities: Capabilities,
    logger: BoxedLogger,
    storage: Option<BoxedStorer>,
}

impl PluginLoadContext {
    /// Creates a load context.
    pub fn new(
        plugin_name: impl Into<Arc<str>>,
        plugin_config: Option<serde_json::Value>,
        capabilities: Capabilities,
        logger: BoxedLogger,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            plugin_config: plugin_config.map(Arc::new),
            capabilities,
            logger,
            storage: None,
        }
    }

    /// Attaches a key/value store.
    pub fn with_storage(mut self, storage: BoxedStorer) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Name of the plugin being loaded.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Key path of this plugin's configuration section.
    pub fn config_path(&self) -> String {
        format!("plugins.{}", self.plugin_name)
    }

    /// The raw configuration section, if present.
    pub fn raw_config(&self) -> Option<&serde_json::Value> {
        self.plugin_config.as_deref()
    }

    /// Deserializes the configuration section into `T`.
    ///
    /// Fails with [`PluginError::MissingConfig`] when the section is absent.
    pub fn get_config<T>(&self) -> PluginResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.raw_config().ok_or_else(|| PluginError::MissingConfig {
            path: self.config_path(),
        })?;
        T::deserialize(value).map_err(|e| PluginError::InvalidConfig {
            path: self.config_path(),
            message: e.to_string(),
        })
    }

    /// Shared capabilities.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Plugin-scoped logger.
    pub fn logger(&self) -> &BoxedLogger {
        &self.logger
    }

    /// Key/value store, if the host provides one.
    pub fn storage(&self) -> Option<&BoxedStorer> {
        self.storage.as_ref()
    }
}

impl fmt::Debug for PluginLoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoadContext")
            .field("plugin_name", &self.plugin_name)
            .field("plugin_config", &self.plugin_config)
            .field("storage", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}

// ─── PluginDescriptor ─────────────────────────────────────────────────────────

/// Builds a [`Plugin`] from its load context.
pub type PluginFactory = fn(&PluginLoadContext) -> PluginResult<Plugin>;

/// Static description of a loadable plugin.
///
/// ```rust
/// use tartan_framework::{Plugin, PluginDescriptor, PluginLoadContext, PluginResult};
///
/// fn build(_ctx: &PluginLoadContext) -> PluginResult<Plugin> {
///     Ok(Plugin::new("banner"))
/// }
///
/// pub static BANNER: PluginDescriptor = PluginDescriptor::new("banner", build).configurable();
/// assert!(BANNER.requires_config);
/// ```
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Plugin name; also selects the `plugins.<name>` config section.
    pub name: &'static str,
    /// Loading fails when the config section is missing.
    pub requires_config: bool,
    /// Factory.
    pub factory: PluginFactory,
}

impl PluginDescriptor {
    /// Creates a descriptor for a plugin that needs no configuration.
    pub const fn new(name: &'static str, factory: PluginFactory) -> Self {
        Self {
            name,
            requires_config: false,
            factory,
        }
    }

    /// Marks the plugin as requiring a configuration section.
    pub const fn configurable(mut self) -> Self {
        self.requires_config = true;
        self
    }

    /// Runs the factory.
    pub fn load(&self, ctx: &PluginLoadContext) -> PluginResult<Plugin> {
        if self.requires_config && ctx.raw_config().is_none() {
            return Err(PluginError::MissingConfig {
                path: ctx.config_path(),
            });
        }

        let plugin = (self.factory)(ctx)?;
        if plugin.name() != self.name {
            warn!(
                descriptor = self.name,
                plugin = plugin.name(),
                "Plugin name differs from its descriptor"
            );
        }
        Ok(plugin)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("requires_config", &self.requires_config)
            .finish_non_exhaustive()
    }
}
