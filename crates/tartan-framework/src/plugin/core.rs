use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::action::{ActionDefinition, ScheduledAction};

/// Hook run once at shutdown.
pub type CloseFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// A named bundle of commands, hear actions and scheduled actions.
///
/// Actions are evaluated in the order they are added. Plugins must be safe to
/// call from several workers at once: the engine does not serialize across
/// partitions.
///
/// # Example
///
/// ```rust
/// use tartan_core::Answer;
/// use tartan_framework::{ActionDefinition, Plugin};
///
/// let plugin = Plugin::new("version").command(
///     ActionDefinition::new("version", "Shows the bot version")
///         .matching(|msg| msg.normalized_text == "version")
///         .answering(|_| Some(Answer::new("I'm tartan, version 1.0.0"))),
/// );
/// assert_eq!(plugin.commands().len(), 1);
/// ```
#[derive(Clone)]
pub struct Plugin {
    name: Arc<str>,
    commands: Vec<ActionDefinition>,
    hear_actions: Vec<ActionDefinition>,
    scheduled_actions: Vec<ScheduledAction>,
    namespace_commands: bool,
    closer: Option<CloseFn>,
}

impl Plugin {
    /// Creates an empty plugin.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            hear_actions: Vec::new(),
            scheduled_actions: Vec::new(),
            namespace_commands: false,
            closer: None,
        }
    }

    /// Adds a command.
    pub fn command(mut self, action: ActionDefinition) -> Self {
        self.commands.push(action);
        self
    }

    /// Adds a hear action.
    pub fn hear(mut self, action: ActionDefinition) -> Self {
        self.hear_actions.push(action);
        self
    }

    /// Adds a scheduled action.
    pub fn scheduled(mut self, action: ScheduledAction) -> Self {
        self.scheduled_actions.push(action);
        self
    }

    /// Requires commands to be prefixed with the plugin name.
    ///
    /// With namespacing on, `karma top` reaches a `top` command of the
    /// `karma` plugin, and the command's predicate sees `top`.
    pub fn namespace_commands(mut self) -> Self {
        self.namespace_commands = true;
        self
    }

    /// Sets the shutdown hook.
    pub fn on_close<F, Fut>(mut self, closer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.closer = Some(Arc::new(move || closer().boxed()));
        self
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared plugin name.
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Commands in registration order.
    pub fn commands(&self) -> &[ActionDefinition] {
        &self.commands
    }

    /// Hear actions in registration order.
    pub fn hear_actions(&self) -> &[ActionDefinition] {
        &self.hear_actions
    }

    /// Scheduled actions in registration order.
    pub fn scheduled_actions(&self) -> &[ScheduledAction] {
        &self.scheduled_actions
    }

    /// Whether commands require the plugin-name prefix.
    pub fn is_namespaced(&self) -> bool {
        self.namespace_commands
    }

    /// Runs the shutdown hook, if any.
    pub async fn close(&self) {
        if let Some(closer) = &self.closer {
            closer().await;
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("commands", &self.commands.len())
            .field("hear_actions", &self.hear_actions.len())
            .field("scheduled_actions", &self.scheduled_actions.len())
            .field("namespace_commands", &self.namespace_commands)
            .finish()
    }
}
