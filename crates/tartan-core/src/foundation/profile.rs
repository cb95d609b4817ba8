//! User directory profiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user as known by the remote directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User id.
    pub id: String,
    /// Handle.
    #[serde(default)]
    pub name: String,
    /// Full name.
    #[serde(default)]
    pub real_name: String,
    /// Whether the user is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Any other directory fields.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UserProfile {
    /// Creates a profile with an id, handle and full name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, real_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            real_name: real_name.into(),
            ..Default::default()
        }
    }

    /// Full name when known, handle otherwise.
    pub fn display_name(&self) -> &str {
        if self.real_name.is_empty() {
            &self.name
        } else {
            &self.real_name
        }
    }
}
