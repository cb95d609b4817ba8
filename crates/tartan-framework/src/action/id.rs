use std::fmt;
use std::sync::Arc;

/// Which list of a plugin an action was registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    /// Runs on messages addressed to the bot.
    Command,
    /// Runs on overheard messages.
    HearAction,
    /// The fallback reply when no command matched.
    DefaultAction,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::HearAction => "hearAction",
            Self::DefaultAction => "defaultAction",
        })
    }
}

/// Stable identity of an action: owning plugin, list and position.
///
/// Replies are tracked per `ActionId`, so an edit of the user's message can
/// tell which replies to update, which to add and which to remove.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId {
    /// Owning plugin.
    pub plugin: Arc<str>,
    /// List the action lives in.
    pub kind: ActionKind,
    /// Position within that list.
    pub index: usize,
}

/// Plugin name owning the built-in help and default actions.
pub const HELP_PLUGIN: &str = "help";

impl ActionId {
    /// Creates an action id.
    pub fn new(plugin: impl Into<Arc<str>>, kind: ActionKind, index: usize) -> Self {
        Self {
            plugin: plugin.into(),
            kind,
            index,
        }
    }

    /// Identity of the built-in help command.
    pub fn help() -> Self {
        Self::new(HELP_PLUGIN, ActionKind::Command, 0)
    }

    /// Identity of the default "I don't understand" reply.
    pub fn default_action() -> Self {
        Self::new(HELP_PLUGIN, ActionKind::DefaultAction, 0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.plugin, self.kind, self.index)
    }
}
