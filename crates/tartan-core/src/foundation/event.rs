//! Real-time events produced by the transport.
//!
//! The engine consumes a stream of [`RtmEvent`]s. Only
//! [`RtmEvent::Message`] is partitioned; everything else is handled inline by
//! the dispatcher.
//!
//! ```text
//! RtmEvent
//! ├── Hello
//! ├── Connected(SelfIdentity)
//! ├── Message(MessageEvent) ── kind() ──▶ New | Changed | Deleted | ReplyAck
//! ├── LatencyReport(Duration)
//! ├── RtmError(String)
//! ├── InvalidAuth
//! └── Termination
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{MessageId, SelfIdentity};

/// Subtype of an edited message.
pub const SUBTYPE_MESSAGE_CHANGED: &str = "message_changed";

/// Subtype of a deleted message.
pub const SUBTYPE_MESSAGE_DELETED: &str = "message_deleted";

/// A typed event from the real-time connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RtmEvent {
    /// The connection handshake started.
    Hello,
    /// The connection is established; carries the bot's own identity.
    Connected(SelfIdentity),
    /// A message was posted, edited or deleted.
    Message(MessageEvent),
    /// Round-trip latency measured by the transport.
    LatencyReport {
        /// Measured latency.
        #[serde(with = "duration_millis")]
        latency: Duration,
    },
    /// A recoverable error reported by the transport.
    RtmError {
        /// Error description.
        message: String,
    },
    /// The credentials were rejected; the engine must stop.
    InvalidAuth,
    /// Orderly shutdown request.
    Termination,
}

/// Nested reference carried by edits and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    /// Timestamp of the edited or deleted message.
    pub timestamp: String,
    /// Text of the message before the change, when the service provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_text: Option<String>,
}

/// A raw message event as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Channel the event happened in.
    pub channel_id: String,
    /// Timestamp of the event itself.
    pub timestamp: String,
    /// Author of the message or edit.
    #[serde(default)]
    pub user_id: String,
    /// Message text; for edits, the new text.
    #[serde(default)]
    pub text: String,
    /// Service subtype (`message_changed`, `message_deleted`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Thread root timestamp, if the message is part of a thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_timestamp: Option<String>,
    /// The edited or deleted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<MessageReference>,
    /// Set when this event acknowledges a message the bot sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
}

/// Classification of a [`MessageEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A new message (including uncommon subtypes such as `bot_message`).
    New,
    /// An edit of an earlier message.
    Changed,
    /// The deletion of an earlier message.
    Deleted,
    /// Acknowledgement of a message the bot sent; ignored.
    ReplyAck,
}

/// A message event that cannot be processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    /// The event has no channel.
    #[error("message event at {timestamp} has no channel")]
    MissingChannel {
        /// Event timestamp.
        timestamp: String,
    },
    /// The event has no timestamp.
    #[error("message event in {channel_id} has no timestamp")]
    MissingTimestamp {
        /// Event channel.
        channel_id: String,
    },
    /// An edit or delete without the nested reference.
    #[error("{subtype} event {channel_id}/{timestamp} carries no message reference")]
    MissingReference {
        /// Event subtype.
        subtype: String,
        /// Event channel.
        channel_id: String,
        /// Event timestamp.
        timestamp: String,
    },
}

impl MessageEvent {
    /// Creates a plain new-message event.
    pub fn new(
        channel_id: impl Into<String>,
        timestamp: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            timestamp: timestamp.into(),
            user_id: user_id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Creates an edit event: `original_ts` is the edited message,
    /// `event_ts` the edit event itself.
    pub fn edit(
        channel_id: impl Into<String>,
        event_ts: impl Into<String>,
        original_ts: impl Into<String>,
        user_id: impl Into<String>,
        new_text: impl Into<String>,
    ) -> Self {
        Self {
            subtype: Some(SUBTYPE_MESSAGE_CHANGED.to_string()),
            reference: Some(MessageReference {
                timestamp: original_ts.into(),
                previous_text: None,
            }),
            ..Self::new(channel_id, event_ts, user_id, new_text)
        }
    }

    /// Creates a delete event for the message at `deleted_ts`.
    pub fn delete(
        channel_id: impl Into<String>,
        event_ts: impl Into<String>,
        deleted_ts: impl Into<String>,
    ) -> Self {
        Self {
            subtype: Some(SUBTYPE_MESSAGE_DELETED.to_string()),
            reference: Some(MessageReference {
                timestamp: deleted_ts.into(),
                previous_text: None,
            }),
            ..Self::new(channel_id, event_ts, "", "")
        }
    }

    /// Sets the thread root (builder style).
    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_timestamp = Some(thread_ts.into());
        self
    }

    /// Classifies this event, rejecting malformed ones.
    pub fn kind(&self) -> Result<MessageKind, MalformedEvent> {
        if self.reply_to.is_some() {
            return Ok(MessageKind::ReplyAck);
        }
        if self.channel_id.is_empty() {
            return Err(MalformedEvent::MissingChannel {
                timestamp: self.timestamp.clone(),
            });
        }
        if self.timestamp.is_empty() {
            return Err(MalformedEvent::MissingTimestamp {
                channel_id: self.channel_id.clone(),
            });
        }

        let kind = match self.subtype.as_deref() {
            Some(SUBTYPE_MESSAGE_CHANGED) => MessageKind::Changed,
            Some(SUBTYPE_MESSAGE_DELETED) => MessageKind::Deleted,
            _ => return Ok(MessageKind::New),
        };

        match &self.reference {
            Some(r) if !r.timestamp.is_empty() => Ok(kind),
            _ => Err(MalformedEvent::MissingReference {
                subtype: self.subtype.clone().unwrap_or_default(),
                channel_id: self.channel_id.clone(),
                timestamp: self.timestamp.clone(),
            }),
        }
    }

    /// Identity of this event.
    pub fn event_id(&self) -> MessageId {
        MessageId::new(self.channel_id.clone(), self.timestamp.clone())
    }

    /// Identity of the message this event is about.
    ///
    /// For edits and deletes this is the referenced message, so that every
    /// event concerning one message shares the same origin.
    pub fn origin_id(&self) -> MessageId {
        let timestamp = match (self.subtype.as_deref(), &self.reference) {
            (Some(SUBTYPE_MESSAGE_CHANGED | SUBTYPE_MESSAGE_DELETED), Some(r)) => &r.timestamp,
            _ => &self.timestamp,
        };
        MessageId::new(self.channel_id.clone(), timestamp.clone())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
