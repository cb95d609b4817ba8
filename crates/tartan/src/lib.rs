//! # Tartan
//!
//! An event engine for chat bots that talk to a Slack-style service.
//!
//! ## Overview
//!
//! Tartan receives real-time events, routes each message to one of N ordered
//! partitions and lets registered plugins answer. Replies are remembered, so
//! when a user edits or deletes a message the bot edits or deletes its
//! answers to match.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌───────────────────────────┐
//! │  Host (RTM   │────▶│   Engine   │────▶│ worker 0  ─┐              │
//! │  connection) │     │ crc32 & N-1│────▶│ worker 1  ─┼─▶ plugins ───│──▶ ChatDriver
//! └──────────────┘     └────────────┘────▶│ ...       ─┘              │
//!                            │            └───────────────────────────┘
//!                            └──▶ scheduler ──▶ scheduled actions ──────────▶ RealTimeSender
//! ```
//!
//! - **Core**: identifiers, events, answers and capability contracts
//! - **Framework**: commands, hear actions, scheduled actions, plugins, help
//! - **Runtime**: dispatcher, workers, response tracker, caches, config, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tartan::prelude::*;
//!
//! fn ping() -> Plugin {
//!     Plugin::new("ping").command(
//!         ActionDefinition::new("ping", "Answers pong")
//!             .matching(|m| m.normalized_text == "ping")
//!             .answering(|_| Some(Answer::new("pong"))),
//!     )
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = TartanRuntime::builder()
//!         .chat_driver(driver)
//!         .user_info_finder(directory)
//!         .emoji_reactor(reactor)
//!         .file_uploader(uploader)
//!         .real_time_sender(sender)
//!         .plugin_instance(ping())
//!         .build()?;
//!
//!     runtime.run_until_signal(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load `tartan.toml` files (default)
//! - `yaml-config`: Load `tartan.yaml` files
//! - `json-log`: JSON log output

pub use tartan_core as core;
pub use tartan_framework as framework;
pub use tartan_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tartan::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use tartan_runtime::{RuntimeBuilder, RuntimeError, TartanConfig, TartanRuntime};

    // Plugin system
    pub use tartan_framework::{
        ActionDefinition, Plugin, PluginDescriptor, PluginError, PluginLoadContext,
        PluginResult, Schedule, ScheduledAction, StringStorer, TimeUnit,
    };

    // Messages and answers
    pub use tartan_core::{
        Answer, AnswerOption, IncomingMessage, MessageEvent, MessageId, RtmEvent, SelfIdentity,
    };

    // Capability contracts for host implementations
    pub use tartan_core::{
        Capabilities, ChatDriver, EmojiReactor, FileUploader, RealTimeSender, UserInfoFinder,
    };
}
