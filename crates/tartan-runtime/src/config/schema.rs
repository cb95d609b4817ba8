//! Configuration schema definitions.
//!
//! Keys are flat and camelCase, with per-plugin sections under `plugins`:
//!
//! ```toml
//! token = "xoxb-..."
//! debug = false
//! responseCacheSize = 5000
//! timeLocation = "America/Los_Angeles"
//! threadedReplies = false
//! broadcastThreadedReplies = true
//! userInfoCacheSize = 500
//! messagePartitionCount = 4
//! messageQueueBufferSize = 64
//!
//! [plugins.banner]
//! text = "Welcome!"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TartanConfig {
    /// Credential for the remote service. Required.
    #[serde(default)]
    pub token: String,

    /// Verbose logging; also enables plugin `debugf` output.
    #[serde(default)]
    pub debug: bool,

    /// Capacity of the response tracker; `<= 0` means unbounded.
    #[serde(default = "default_response_cache_size")]
    pub response_cache_size: i64,

    /// IANA zone name for scheduled actions, or `Local`.
    #[serde(default = "default_time_location")]
    pub time_location: String,

    /// Reply in threads unless an answer says otherwise.
    #[serde(default)]
    pub threaded_replies: bool,

    /// Broadcast threaded replies unless an answer says otherwise.
    #[serde(default = "default_true")]
    pub broadcast_threaded_replies: bool,

    /// Capacity of the user-info cache; `<= 0` disables it.
    #[serde(default)]
    pub user_info_cache_size: i64,

    /// Number of worker lanes. Must be a power of two.
    #[serde(default = "default_partition_count")]
    pub message_partition_count: i64,

    /// Capacity of each lane's queue.
    #[serde(default = "default_queue_buffer_size")]
    pub message_queue_buffer_size: i64,

    /// Per-plugin configuration sections, keyed by plugin name.
    #[serde(default)]
    pub plugins: BTreeMap<String, serde_json::Value>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Top-level keys, as spelled in files. Used to map environment variables.
pub(crate) const TOP_LEVEL_KEYS: &[&str] = &[
    "token",
    "debug",
    "responseCacheSize",
    "timeLocation",
    "threadedReplies",
    "broadcastThreadedReplies",
    "userInfoCacheSize",
    "messagePartitionCount",
    "messageQueueBufferSize",
    "plugins",
    "logging",
];

fn default_response_cache_size() -> i64 {
    5000
}

fn default_time_location() -> String {
    "Local".to_string()
}

fn default_true() -> bool {
    true
}

fn default_partition_count() -> i64 {
    1
}

fn default_queue_buffer_size() -> i64 {
    64
}

impl Default for TartanConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            debug: false,
            response_cache_size: default_response_cache_size(),
            time_location: default_time_location(),
            threaded_replies: false,
            broadcast_threaded_replies: true,
            user_info_cache_size: 0,
            message_partition_count: default_partition_count(),
            message_queue_buffer_size: default_queue_buffer_size(),
            plugins: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TartanConfig {
    /// Creates a default configuration with a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// The `plugins.<name>` section, if present.
    pub fn plugin_config(&self, name: &str) -> Option<&serde_json::Value> {
        self.plugins.get(name)
    }

    /// Response tracker capacity; `None` means unbounded.
    pub fn response_capacity(&self) -> Option<usize> {
        positive(self.response_cache_size)
    }

    /// User-info cache capacity; `None` disables the cache.
    pub fn user_info_capacity(&self) -> Option<usize> {
        positive(self.user_info_cache_size)
    }
}

fn positive(n: i64) -> Option<usize> {
    usize::try_from(n).ok().filter(|&n| n > 0)
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default level. `debug = true` raises it to at least `debug`.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file, for [`LogOutput::File`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `tartan_runtime::engine = "trace"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: BTreeMap::new(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// The matching `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated.
    #[default]
    Compact,
    /// Single-line, full.
    Full,
    /// Multi-line, human oriented.
    Pretty,
    /// Newline-delimited JSON (requires the `json-log` feature).
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A file (see [`LoggingConfig::file_path`]).
    File,
}

/// Which span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    /// Span creation.
    #[serde(default)]
    pub new: bool,
    /// Span entered.
    #[serde(default)]
    pub enter: bool,
    /// Span exited.
    #[serde(default)]
    pub exit: bool,
    /// Span closed.
    #[serde(default)]
    pub close: bool,
}
