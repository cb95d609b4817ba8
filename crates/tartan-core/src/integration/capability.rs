//! Capability contracts between the engine, plugins and the remote service.
//!
//! The engine never talks to the remote service directly. Instead it is
//! handed a fixed set of capabilities, each a small trait object:
//!
//! | Capability | Used by | Purpose |
//! |------------|---------|---------|
//! | [`ChatDriver`] | engine | send / update / delete replies |
//! | [`EmojiReactor`] | plugins | add emoji reactions |
//! | [`FileUploader`] | plugins | upload files |
//! | [`RealTimeSender`] | plugins, scheduled actions | post unsolicited messages |
//! | [`UserInfoFinder`] | plugins | resolve user profiles |
//! | [`SLogger`] | plugins | plugin-scoped logging |
//!
//! Plugins receive the last five bundled in [`Capabilities`] when they are
//! loaded. Capabilities never hold references back to plugins.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiResult, UserInfoResult};
use crate::foundation::{IncomingMessage, MessageId, OutboundMessage, UserProfile};

// =============================================================================
// Chat driver
// =============================================================================

/// Synchronous-from-the-caller's-view message operations.
#[async_trait]
pub trait ChatDriver: Send + Sync {
    /// Posts a message and returns the identity the service assigned to it.
    async fn send_message(&self, channel_id: &str, message: &OutboundMessage)
    -> ApiResult<MessageId>;

    /// Posts a message visible only to `user_id`.
    ///
    /// Ephemeral messages cannot be edited or deleted afterwards.
    async fn send_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &OutboundMessage,
    ) -> ApiResult<()>;

    /// Replaces the content of an existing message.
    async fn update_message(
        &self,
        target: &MessageId,
        message: &OutboundMessage,
    ) -> ApiResult<MessageId>;

    /// Deletes an existing message.
    async fn delete_message(&self, target: &MessageId) -> ApiResult<()>;
}

// =============================================================================
// Emoji reactor
// =============================================================================

/// Adds emoji reactions to messages.
#[async_trait]
pub trait EmojiReactor: Send + Sync {
    /// Adds reaction `name` (without colons) to `item`.
    async fn add_reaction(&self, name: &str, item: &MessageId) -> ApiResult<()>;
}

// =============================================================================
// File uploader
// =============================================================================

/// Parameters of a file upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadParams {
    /// File name shown to users.
    pub filename: String,
    /// Optional title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional file type hint (`png`, `text`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filetype: Option<String>,
    /// Channels to share the file in.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Message posted along with the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_comment: Option<String>,
    /// Thread to upload into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_timestamp: Option<String>,
    /// File content.
    #[serde(default)]
    pub content: Vec<u8>,
}

/// Extra behavior applied to a file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOption {
    /// Upload into the thread of a message.
    InThread {
        /// Channel of the thread.
        channel_id: String,
        /// Root timestamp of the thread.
        thread_timestamp: String,
    },
}

impl UploadOption {
    /// Upload into the thread `msg` belongs to, or start one on it.
    pub fn in_thread_of(msg: &IncomingMessage) -> Self {
        let thread_timestamp = msg
            .thread_timestamp
            .clone()
            .unwrap_or_else(|| msg.original_msg_id.timestamp.clone());
        Self::InThread {
            channel_id: msg.channel_id.clone(),
            thread_timestamp,
        }
    }

    /// Applies this option to upload parameters.
    pub fn apply(&self, params: &mut FileUploadParams) {
        match self {
            Self::InThread {
                channel_id,
                thread_timestamp,
            } => {
                params.channels = vec![channel_id.clone()];
                params.thread_timestamp = Some(thread_timestamp.clone());
            }
        }
    }
}

/// A successfully uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// File id assigned by the service.
    pub id: String,
    /// File name.
    pub name: String,
    /// Permanent link, when the service returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

/// Uploads files.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Uploads a file. Options are applied to `params` in order.
    async fn upload_file(
        &self,
        params: FileUploadParams,
        options: &[UploadOption],
    ) -> ApiResult<UploadedFile>;
}

// =============================================================================
// Real-time sender
// =============================================================================

/// Posts messages that do not answer any incoming message.
///
/// Used by scheduled actions and by plugins that speak unprompted.
#[async_trait]
pub trait RealTimeSender: Send + Sync {
    /// Posts `text` to `channel_id`.
    async fn send_new_message(&self, text: &str, channel_id: &str) -> ApiResult<()>;
}

// =============================================================================
// User info finder
// =============================================================================

/// Resolves user profiles.
#[async_trait]
pub trait UserInfoFinder: Send + Sync {
    /// Looks up a user by id.
    async fn get_user(&self, user_id: &str) -> UserInfoResult<UserProfile>;
}

// =============================================================================
// Logger
// =============================================================================

/// Plugin-scoped logger.
///
/// ```rust,ignore
/// logger.printf(format_args!("karma for {user} is now {count}"));
/// logger.debugf(format_args!("ignoring self-karma from {user}"));
/// ```
pub trait SLogger: Send + Sync {
    /// Logs unconditionally.
    fn printf(&self, args: fmt::Arguments<'_>);

    /// Logs only when debug logging is enabled.
    fn debugf(&self, args: fmt::Arguments<'_>);
}

// =============================================================================
// Boxed aliases and bundle
// =============================================================================

/// Shared chat driver.
pub type BoxedChatDriver = Arc<dyn ChatDriver>;
/// Shared emoji reactor.
pub type BoxedEmojiReactor = Arc<dyn EmojiReactor>;
/// Shared file uploader.
pub type BoxedFileUploader = Arc<dyn FileUploader>;
/// Shared real-time sender.
pub type BoxedRealTimeSender = Arc<dyn RealTimeSender>;
/// Shared user info finder.
pub type BoxedUserInfoFinder = Arc<dyn UserInfoFinder>;
/// Shared logger.
pub type BoxedLogger = Arc<dyn SLogger>;

/// The capabilities handed to every plugin at load time.
#[derive(Clone)]
pub struct Capabilities {
    /// User directory lookups (possibly cached).
    pub user_info: BoxedUserInfoFinder,
    /// Emoji reactions.
    pub emoji_reactor: BoxedEmojiReactor,
    /// File uploads.
    pub file_uploader: BoxedFileUploader,
    /// Unsolicited messages.
    pub real_time_sender: BoxedRealTimeSender,
}

impl Capabilities {
    /// Bundles the four shared capabilities.
    pub fn new(
        user_info: BoxedUserInfoFinder,
        emoji_reactor: BoxedEmojiReactor,
        file_uploader: BoxedFileUploader,
        real_time_sender: BoxedRealTimeSender,
    ) -> Self {
        Self {
            user_info,
            emoji_reactor,
            file_uploader,
            real_time_sender,
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_in_thread_of_plain_message_roots_thread_on_it() {
        let msg = IncomingMessage::new("C1", "100.0", "U1", "banner hi");
        let mut params = FileUploadParams {
            filename: "banner.txt".into(),
            ..Default::default()
        };
        UploadOption::in_thread_of(&msg).apply(&mut params);
        assert_eq!(params.channels, vec!["C1".to_string()]);
        assert_eq!(params.thread_timestamp.as_deref(), Some("100.0"));
    }

    #[test]
    fn test_upload_in_thread_of_threaded_message_uses_existing_root() {
        let mut msg = IncomingMessage::new("C1", "105.0", "U1", "banner hi");
        msg.thread_timestamp = Some("90.0".into());
        assert_eq!(
            UploadOption::in_thread_of(&msg),
            UploadOption::InThread {
                channel_id: "C1".into(),
                thread_timestamp: "90.0".into()
            }
        );
    }
}
