//! Runtime assembly.
//!
//! [`RuntimeBuilder`] loads and validates configuration, wraps the host's
//! capabilities with instrumentation and caching, loads plugins and wires the
//! engine together. [`TartanRuntime`] then runs it against an event stream.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tartan_runtime::TartanRuntime;
//!
//! let runtime = TartanRuntime::builder()
//!     .config_file("tartan.toml")
//!     .chat_driver(driver)
//!     .user_info_finder(directory)
//!     .emoji_reactor(reactor)
//!     .file_uploader(uploader)
//!     .real_time_sender(sender)
//!     .plugin(KARMA)
//!     .build()?;
//!
//! runtime.run_until_signal(events).await?;
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use parking_lot::RwLock;
use tartan_core::{
    BoxedChatDriver, BoxedEmojiReactor, BoxedFileUploader, BoxedRealTimeSender,
    BoxedUserInfoFinder, Capabilities, RtmEvent,
};
use tartan_framework::{
    BoxedStorer, Plugin, PluginDescriptor, PluginLoadContext, PluginLogger, PluginRegistry,
    TimeLocation,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ConfigLoader, TartanConfig, validate_config};
use crate::engine::{
    CachingUserInfoFinder, Engine, EngineSettings, EngineStats, InstrumentedChatDriver,
    InstrumentedEmojiReactor, InstrumentedFileUploader, InstrumentedRealTimeSender,
    MessageProcessor, Metrics, ReplySettings, ResponseTracker, SharedIdentity,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

// =============================================================================
// TartanRuntime
// =============================================================================

/// A fully wired engine, ready to consume an event stream once.
pub struct TartanRuntime {
    config: TartanConfig,
    engine: Engine,
    registry: Arc<PluginRegistry>,
    tracker: Arc<ResponseTracker>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl TartanRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// The configuration the runtime was built with.
    pub fn config(&self) -> &TartanConfig {
        &self.config
    }

    /// The plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Help text listing every visible action.
    pub fn help_text(&self) -> String {
        self.registry.help_text()
    }

    /// Replies the engine currently tracks.
    pub fn responses(&self) -> &ResponseTracker {
        &self.tracker
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> EngineStats {
        self.metrics.snapshot()
    }

    /// A handle that stops [`run`](Self::run) from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Consumes `events` until termination, then shuts down in order.
    ///
    /// A runtime runs once; later calls fail with
    /// [`RuntimeError::AlreadyStarted`].
    pub async fn run<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = RtmEvent> + Send + Unpin,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Err(RuntimeError::AlreadyStarted);
        }

        info!("Tartan runtime is now running");
        let result = self.engine.run(events).await;
        match &result {
            Ok(()) => info!("Runtime stopped"),
            Err(e) => error!(error = %e, "Runtime stopped with an error"),
        }
        result
    }

    /// Like [`run`](Self::run), also shutting down on Ctrl+C or SIGTERM.
    pub async fn run_until_signal<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = RtmEvent> + Send + Unpin,
    {
        let run = self.run(events);
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => return result,
            _ = wait_for_shutdown() => self.shutdown.cancel(),
        }
        run.await
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

/// Requests an orderly shutdown of a running [`TartanRuntime`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Stops the event loop; workers drain and plugins close.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for TartanRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TartanRuntime")
            .field("plugins", &self.registry.plugins().len())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

enum PluginSource {
    Descriptor(PluginDescriptor),
    Instance(Plugin),
}

/// Builder for a [`TartanRuntime`].
///
/// Plugins are registered in the order they are added, whether from a
/// descriptor or as a ready instance.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<TartanConfig>,
    init_logging: bool,
    chat_driver: Option<BoxedChatDriver>,
    user_info: Option<BoxedUserInfoFinder>,
    emoji_reactor: Option<BoxedEmojiReactor>,
    file_uploader: Option<BoxedFileUploader>,
    real_time_sender: Option<BoxedRealTimeSender>,
    storage: Option<BoxedStorer>,
    plugins: Vec<PluginSource>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            init_logging: true,
            chat_driver: None,
            user_info: None,
            emoji_reactor: None,
            file_uploader: None,
            real_time_sender: None,
            storage: None,
            plugins: Vec::new(),
        }
    }

    // ─── Configuration ─────────────────────────────────────────────

    /// Uses `config` as is instead of loading files and environment.
    pub fn config(mut self, config: TartanConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    // ─── Capabilities ──────────────────────────────────────────────

    /// Sets the chat driver. Required.
    pub fn chat_driver(mut self, driver: BoxedChatDriver) -> Self {
        self.chat_driver = Some(driver);
        self
    }

    /// Sets the user directory. Required.
    pub fn user_info_finder(mut self, finder: BoxedUserInfoFinder) -> Self {
        self.user_info = Some(finder);
        self
    }

    /// Sets the emoji reactor. Required.
    pub fn emoji_reactor(mut self, reactor: BoxedEmojiReactor) -> Self {
        self.emoji_reactor = Some(reactor);
        self
    }

    /// Sets the file uploader. Required.
    pub fn file_uploader(mut self, uploader: BoxedFileUploader) -> Self {
        self.file_uploader = Some(uploader);
        self
    }

    /// Sets the real-time sender. Required.
    pub fn real_time_sender(mut self, sender: BoxedRealTimeSender) -> Self {
        self.real_time_sender = Some(sender);
        self
    }

    /// Gives plugins a key/value store.
    pub fn storage(mut self, storage: BoxedStorer) -> Self {
        self.storage = Some(storage);
        self
    }

    // ─── Plugins ───────────────────────────────────────────────────

    /// Loads a plugin from its descriptor at build time.
    pub fn plugin(mut self, descriptor: PluginDescriptor) -> Self {
        self.plugins.push(PluginSource::Descriptor(descriptor));
        self
    }

    /// Registers an already built plugin.
    pub fn plugin_instance(mut self, plugin: Plugin) -> Self {
        self.plugins.push(PluginSource::Instance(plugin));
        self
    }

    // ─── Build ─────────────────────────────────────────────────────

    /// Validates configuration, loads plugins and wires the engine.
    pub fn build(self) -> RuntimeResult<TartanRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging, config.debug);
        }

        let location = TimeLocation::parse(&config.time_location).map_err(ConfigError::from)?;
        let settings = EngineSettings {
            partitions: to_usize(config.message_partition_count, "messagePartitionCount")?,
            queue_buffer: to_usize(config.message_queue_buffer_size, "messageQueueBufferSize")?,
        };
        let metrics = Metrics::new(settings.partitions);

        let driver = self
            .chat_driver
            .ok_or(RuntimeError::MissingCapability("chat driver"))?;
        let user_info = self
            .user_info
            .ok_or(RuntimeError::MissingCapability("user info finder"))?;
        let reactor = self
            .emoji_reactor
            .ok_or(RuntimeError::MissingCapability("emoji reactor"))?;
        let uploader = self
            .file_uploader
            .ok_or(RuntimeError::MissingCapability("file uploader"))?;
        let sender = self
            .real_time_sender
            .ok_or(RuntimeError::MissingCapability("real-time sender"))?;

        let driver: BoxedChatDriver =
            Arc::new(InstrumentedChatDriver::new(driver, Arc::clone(&metrics)));
        let sender: BoxedRealTimeSender =
            Arc::new(InstrumentedRealTimeSender::new(sender, Arc::clone(&metrics)));
        let capabilities = Capabilities::new(
            CachingUserInfoFinder::wrap(user_info, config.user_info_capacity()),
            Arc::new(InstrumentedEmojiReactor::new(reactor, Arc::clone(&metrics))),
            Arc::new(InstrumentedFileUploader::new(uploader, Arc::clone(&metrics))),
            Arc::clone(&sender),
        );

        let mut registry = PluginRegistry::builder();
        for source in self.plugins {
            let plugin = match source {
                PluginSource::Instance(plugin) => plugin,
                PluginSource::Descriptor(descriptor) => {
                    let mut ctx = PluginLoadContext::new(
                        descriptor.name,
                        config.plugin_config(descriptor.name).cloned(),
                        capabilities.clone(),
                        Arc::new(PluginLogger::new(descriptor.name, config.debug)),
                    );
                    if let Some(storage) = &self.storage {
                        ctx = ctx.with_storage(Arc::clone(storage));
                    }
                    debug!(plugin = descriptor.name, "Loading plugin");
                    descriptor.load(&ctx)?
                }
            };
            registry.register(plugin)?;
        }
        let registry = Arc::new(registry.build());

        let tracker = Arc::new(ResponseTracker::new(config.response_capacity()));
        let identity: SharedIdentity = Arc::new(RwLock::new(None));
        let processor = Arc::new(MessageProcessor::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            driver,
            Arc::clone(&identity),
            ReplySettings {
                threaded_replies: config.threaded_replies,
                broadcast_threaded_replies: config.broadcast_threaded_replies,
            },
            Arc::clone(&metrics),
        ));

        let shutdown = CancellationToken::new();
        let engine = Engine::new(
            Arc::clone(&registry),
            processor,
            identity,
            sender,
            location,
            settings,
            Arc::clone(&metrics),
            shutdown.clone(),
        );

        info!(
            plugins = registry.plugins().len(),
            commands = registry.commands().len(),
            hear_actions = registry.hear_actions().len(),
            scheduled = registry.scheduled_actions().len(),
            partitions = settings.partitions,
            time_location = %config.time_location,
            "Runtime initialized from configuration"
        );

        Ok(TartanRuntime {
            config,
            engine,
            registry,
            tracker,
            metrics,
            shutdown,
            started: AtomicBool::new(false),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn to_usize(value: i64, field: &str) -> RuntimeResult<usize> {
    usize::try_from(value)
        .map_err(|_| ConfigError::validation(format!("{field} must be positive, got {value}")).into())
}
