//! Message and bot identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a single chat message: the channel it lives in and the
/// timestamp the remote service assigned to it.
///
/// Timestamps are opaque decimal strings (`"1512085950.000216"`) and are only
/// ever compared as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Service-assigned message timestamp.
    pub timestamp: String,
}

impl MessageId {
    /// Creates a new message id.
    pub fn new(channel_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Returns `true` if the message lives in a direct-message channel.
    ///
    /// Direct-message channel ids start with `D`.
    pub fn is_direct(&self) -> bool {
        is_direct_channel(&self.channel_id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.timestamp)
    }
}

/// Returns `true` if `channel_id` names a direct-message channel.
pub fn is_direct_channel(channel_id: &str) -> bool {
    channel_id.starts_with('D')
}

/// The bot's own identity, announced by the `connected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIdentity {
    /// The bot user's id.
    pub user_id: String,
    /// The bot user's handle.
    pub user_name: String,
}

impl SelfIdentity {
    /// Creates a new self identity.
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }

    /// Strips a leading mention of the bot from `text`.
    ///
    /// Recognized forms are `<@ID>`, `ID:`, `name:`, `@ID ` and `@name `.
    /// Returns the remainder, trimmed, or `None` when `text` does not start
    /// with a mention.
    pub fn strip_mention<'a>(&self, text: &'a str) -> Option<&'a str> {
        let text = text.trim_start();
        let id = self.user_id.as_str();
        let name = self.user_name.as_str();

        let rest = text
            .strip_prefix("<@")
            .and_then(|r| r.strip_prefix(id))
            .and_then(|r| r.strip_prefix('>'))
            .or_else(|| non_empty(id).and_then(|id| text.strip_prefix(id)?.strip_prefix(':')))
            .or_else(|| non_empty(name).and_then(|n| text.strip_prefix(n)?.strip_prefix(':')))
            .or_else(|| {
                non_empty(id).and_then(|id| text.strip_prefix('@')?.strip_prefix(id)?.strip_prefix(' '))
            })
            .or_else(|| {
                non_empty(name)
                    .and_then(|n| text.strip_prefix('@')?.strip_prefix(n)?.strip_prefix(' '))
            })?;

        Some(rest.trim())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> SelfIdentity {
        SelfIdentity::new("BOT", "tartan")
    }

    #[test]
    fn test_direct_channel_prefix() {
        assert!(MessageId::new("DXYZ", "1.0").is_direct());
        assert!(!MessageId::new("C1", "1.0").is_direct());
    }

    #[test]
    fn test_strip_mention_forms() {
        let me = bot();
        assert_eq!(me.strip_mention("<@BOT> version"), Some("version"));
        assert_eq!(me.strip_mention("BOT: version"), Some("version"));
        assert_eq!(me.strip_mention("tartan:  version "), Some("version"));
        assert_eq!(me.strip_mention("@BOT version"), Some("version"));
        assert_eq!(me.strip_mention("@tartan version"), Some("version"));
    }

    #[test]
    fn test_strip_mention_rejects_other_text() {
        let me = bot();
        assert_eq!(me.strip_mention("version"), None);
        assert_eq!(me.strip_mention("<@OTHER> version"), None);
        assert_eq!(me.strip_mention("BOT++"), None);
        assert_eq!(me.strip_mention("@BOTversion"), None);
    }
}
