//! Incoming messages handed to plugins and the answers they produce.
//!
//! # Answer options
//!
//! Answers carry a small, closed set of delivery options. They are built from
//! a list of [`AnswerOption`] values applied in order:
//!
//! ```rust
//! use tartan_core::{Answer, AnswerOption};
//!
//! let answer = Answer::new("pong")
//!     .with(AnswerOption::ThreadedReply(true))
//!     .with(AnswerOption::Broadcast(false));
//!
//! assert_eq!(answer.options.threaded_reply, Some(true));
//! assert_eq!(answer.options.broadcast, Some(false));
//! ```
//!
//! Options touching different keys commute; a later value for the same key
//! overrides an earlier one. Unknown keys are kept in
//! [`AnswerOptions::extra`] and passed through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::MessageId;

// =============================================================================
// IncomingMessage
// =============================================================================

/// The normalized input handed to plugin matchers and answerers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Identity of the event itself (for edits, the edit event's timestamp).
    pub msg_id: MessageId,
    /// Author of the message (or of the edit).
    pub user_id: String,
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Text as received.
    pub raw_text: String,
    /// Text with any leading bot mention stripped and whitespace trimmed.
    pub normalized_text: String,
    /// Root timestamp of the thread this message lives in, if any.
    pub thread_timestamp: Option<String>,
    /// Service subtype of the message (`None` for plain messages).
    pub subtype: Option<String>,
    /// The message the bot's replies are attached to.
    ///
    /// Equal to `msg_id` for new messages; the edited/deleted message for
    /// edits and deletes.
    pub original_msg_id: MessageId,
}

impl IncomingMessage {
    /// Creates a new plain message with no thread, subtype or mention.
    pub fn new(
        channel_id: impl Into<String>,
        timestamp: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let channel_id = channel_id.into();
        let msg_id = MessageId::new(channel_id.clone(), timestamp);
        let raw_text = text.into();
        Self {
            original_msg_id: msg_id.clone(),
            msg_id,
            user_id: user_id.into(),
            channel_id,
            normalized_text: raw_text.trim().to_string(),
            raw_text,
            thread_timestamp: None,
            subtype: None,
        }
    }

    /// Returns a copy of this message with a different normalized text.
    pub fn with_normalized_text(&self, text: impl Into<String>) -> Self {
        Self {
            normalized_text: text.into(),
            ..self.clone()
        }
    }

    /// Returns `true` if the message was posted inside a thread.
    pub fn is_threaded(&self) -> bool {
        self.thread_timestamp.is_some()
    }
}

// =============================================================================
// Answer options
// =============================================================================

/// A single delivery option for an [`Answer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "option", content = "value", rename_all = "camelCase")]
pub enum AnswerOption {
    /// Reply in a thread rooted at the original message.
    ThreadedReply(bool),
    /// Reply in an existing thread rooted at this timestamp.
    ExistingThreadTimestamp(String),
    /// Also broadcast a threaded reply to the channel.
    Broadcast(bool),
    /// Deliver as an ephemeral message visible only to this user.
    EphemeralToUser(String),
    /// Any other key, passed through to the chat driver.
    Extra(String, String),
}

impl AnswerOption {
    /// Key this option writes to.
    pub fn key(&self) -> &str {
        match self {
            Self::ThreadedReply(_) => "threadedReply",
            Self::ExistingThreadTimestamp(_) => "existingThreadTimestamp",
            Self::Broadcast(_) => "broadcast",
            Self::EphemeralToUser(_) => "ephemeralToUser",
            Self::Extra(key, _) => key,
        }
    }

    /// Parses an option from its string form.
    ///
    /// Boolean keys accept `true`/`false`; anything else is kept as
    /// [`AnswerOption::Extra`].
    pub fn parse(key: &str, value: &str) -> Self {
        match (key, value.parse::<bool>()) {
            ("threadedReply", Ok(b)) => Self::ThreadedReply(b),
            ("broadcast", Ok(b)) => Self::Broadcast(b),
            ("existingThreadTimestamp", _) => Self::ExistingThreadTimestamp(value.to_string()),
            ("ephemeralToUser", _) => Self::EphemeralToUser(value.to_string()),
            _ => Self::Extra(key.to_string(), value.to_string()),
        }
    }
}

/// The resolved set of options on an [`Answer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOptions {
    /// Reply in a thread of the original message.
    pub threaded_reply: Option<bool>,
    /// Reply in this existing thread.
    pub existing_thread_timestamp: Option<String>,
    /// Broadcast a threaded reply to the channel.
    pub broadcast: Option<bool>,
    /// Send as an ephemeral message to this user.
    pub ephemeral_to_user: Option<String>,
    /// Unrecognized options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl AnswerOptions {
    /// Applies a single option, overriding any previous value for its key.
    pub fn apply(&mut self, option: AnswerOption) {
        match option {
            AnswerOption::ThreadedReply(b) => self.threaded_reply = Some(b),
            AnswerOption::ExistingThreadTimestamp(ts) => self.existing_thread_timestamp = Some(ts),
            AnswerOption::Broadcast(b) => self.broadcast = Some(b),
            AnswerOption::EphemeralToUser(user) => self.ephemeral_to_user = Some(user),
            AnswerOption::Extra(key, value) => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Builds options from a sequence, applied in order.
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = AnswerOption>,
    {
        let mut resolved = Self::default();
        for option in options {
            resolved.apply(option);
        }
        resolved
    }

    /// Returns `true` if this answer must be delivered ephemerally.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_to_user.is_some()
    }
}

// =============================================================================
// Answer
// =============================================================================

/// The normalized output of a plugin action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Plain text content.
    pub text: String,
    /// Rich content blocks, passed to the chat driver as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blocks: Option<Vec<Value>>,
    /// Delivery options.
    #[serde(default)]
    pub options: AnswerOptions,
}

impl Answer {
    /// Creates a plain text answer.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Creates an answer carrying content blocks.
    pub fn blocks(text: impl Into<String>, blocks: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            content_blocks: Some(blocks),
            ..Default::default()
        }
    }

    /// Applies an option (builder style).
    pub fn with(mut self, option: AnswerOption) -> Self {
        self.options.apply(option);
        self
    }

    /// Returns `true` if there is nothing to send.
    ///
    /// Blocks count as content even when empty; only the absence of both
    /// text and blocks makes an answer empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.content_blocks.is_none()
    }
}

// =============================================================================
// OutboundMessage
// =============================================================================

/// A fully resolved message ready for the chat driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Plain text content.
    pub text: String,
    /// Rich content blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Value>>,
    /// Thread to post into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_timestamp: Option<String>,
    /// Broadcast the threaded reply to the channel.
    #[serde(default)]
    pub broadcast: bool,
    /// Pass-through options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Creates a plain text message with no threading.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}
