//! Plugin registry.
//!
//! Plugins are registered in order into a [`RegistryBuilder`]; building it
//! flattens every plugin's actions into ordered lists and generates the help
//! command once. The resulting [`PluginRegistry`] is immutable and shared by
//! all workers.
//!
//! ```text
//! RegistryBuilder ── register(plugin)* ── build() ──▶ PluginRegistry
//!                                                     ├── commands      [ActionId(p, Command, i)]
//!                                                     ├── hear_actions  [ActionId(p, HearAction, i)]
//!                                                     ├── scheduled     [(p, i)]
//!                                                     └── help          ActionId(help, Command, 0)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tartan_core::{Answer, IncomingMessage};
use tracing::info;

use crate::action::{ActionDefinition, ActionId, ActionKind, HELP_PLUGIN, ScheduledAction};
use crate::error::{ActionPanic, PanicStage, PluginError, PluginResult};
use crate::help;
use crate::plugin::Plugin;

// =============================================================================
// RegisteredAction
// =============================================================================

/// How a message reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageContext {
    /// Addressed to the bot: a direct channel or a leading mention.
    Command,
    /// Overheard in a channel.
    Hear,
}

/// Result of evaluating one action against one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The predicate rejected the message.
    NoMatch,
    /// The predicate accepted it; the answerer produced this, if anything.
    Matched(Option<Answer>),
}

/// A command or hear action bound to its identity.
#[derive(Debug, Clone)]
pub struct RegisteredAction {
    id: ActionId,
    namespace: Option<Arc<str>>,
    definition: ActionDefinition,
}

impl RegisteredAction {
    pub(crate) fn new(
        id: ActionId,
        namespace: Option<Arc<str>>,
        definition: ActionDefinition,
    ) -> Self {
        Self {
            id,
            namespace,
            definition,
        }
    }

    /// The action identity.
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// The action itself.
    pub fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    /// Usage as users must type it, including any namespace prefix.
    pub fn usage(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns} {}", self.definition.usage()),
            None => self.definition.usage().to_string(),
        }
    }

    /// The message as the predicate sees it, or `None` when a required
    /// namespace prefix is missing.
    pub fn prepare(&self, msg: &IncomingMessage) -> Option<IncomingMessage> {
        let Some(ns) = &self.namespace else {
            return Some(msg.clone());
        };
        let rest = msg
            .normalized_text
            .strip_prefix(ns.as_ref())?
            .strip_prefix(' ')?;
        Some(msg.with_normalized_text(rest.trim_start()))
    }

    /// Evaluates the action, containing any panic.
    pub async fn evaluate(&self, msg: &IncomingMessage) -> Result<Evaluation, ActionPanic> {
        let Some(prepared) = self.prepare(msg) else {
            return Ok(Evaluation::NoMatch);
        };

        let matched = panic::catch_unwind(AssertUnwindSafe(|| self.definition.matches(&prepared)))
            .map_err(|p| ActionPanic::from_payload(self.id.clone(), PanicStage::Matching, p))?;
        if !matched {
            return Ok(Evaluation::NoMatch);
        }

        let answer = AssertUnwindSafe(async { self.definition.answer(prepared).await })
            .catch_unwind()
            .await
            .map_err(|p| ActionPanic::from_payload(self.id.clone(), PanicStage::Answering, p))?;
        Ok(Evaluation::Matched(answer))
    }
}

/// A scheduled action bound to its owning plugin.
#[derive(Debug, Clone)]
pub struct RegisteredSchedule {
    plugin: Arc<str>,
    index: usize,
    action: ScheduledAction,
}

impl RegisteredSchedule {
    /// Owning plugin.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Position within the plugin.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The scheduled action.
    pub fn action(&self) -> &ScheduledAction {
        &self.action
    }
}

// =============================================================================
// RegistryBuilder
// =============================================================================

/// Collects plugins in registration order.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    plugins: Vec<Plugin>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin.
    ///
    /// Rejects duplicate names, the reserved [`HELP_PLUGIN`] name and invalid
    /// schedules.
    pub fn register(&mut self, plugin: Plugin) -> PluginResult<()> {
        if plugin.name() == HELP_PLUGIN {
            return Err(PluginError::Reserved {
                name: plugin.name().to_string(),
            });
        }
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(PluginError::Duplicate {
                name: plugin.name().to_string(),
            });
        }
        for (index, action) in plugin.scheduled_actions().iter().enumerate() {
            action
                .schedule()
                .validate()
                .map_err(|source| PluginError::InvalidSchedule {
                    plugin: plugin.name().to_string(),
                    index,
                    source,
                })?;
        }

        info!(
            plugin = %plugin.name(),
            commands = plugin.commands().len(),
            hear_actions = plugin.hear_actions().len(),
            scheduled = plugin.scheduled_actions().len(),
            "Plugin registered"
        );
        self.plugins.push(plugin);
        Ok(())
    }

    /// Registers a plugin (builder style).
    pub fn with(mut self, plugin: Plugin) -> PluginResult<Self> {
        self.register(plugin)?;
        Ok(self)
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Flattens the plugins and builds the help command.
    pub fn build(self) -> PluginRegistry {
        let mut commands = Vec::new();
        let mut hear_actions = Vec::new();
        let mut scheduled = Vec::new();

        for plugin in &self.plugins {
            let name = plugin.name_arc();
            let namespace = plugin.is_namespaced().then(|| Arc::clone(&name));

            for (i, def) in plugin.commands().iter().enumerate() {
                commands.push(RegisteredAction::new(
                    ActionId::new(Arc::clone(&name), ActionKind::Command, i),
                    namespace.clone(),
                    def.clone(),
                ));
            }
            for (i, def) in plugin.hear_actions().iter().enumerate() {
                hear_actions.push(RegisteredAction::new(
                    ActionId::new(Arc::clone(&name), ActionKind::HearAction, i),
                    None,
                    def.clone(),
                ));
            }
            for (index, action) in plugin.scheduled_actions().iter().enumerate() {
                scheduled.push(RegisteredSchedule {
                    plugin: Arc::clone(&name),
                    index,
                    action: action.clone(),
                });
            }
        }

        let help = help::help_action(&commands, &hear_actions, &scheduled);

        PluginRegistry {
            plugins: self.plugins,
            commands,
            hear_actions,
            scheduled,
            help,
        }
    }
}

// =============================================================================
// PluginRegistry
// =============================================================================

/// Immutable, flattened view of every registered plugin.
#[derive(Debug)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
    commands: Vec<RegisteredAction>,
    hear_actions: Vec<RegisteredAction>,
    scheduled: Vec<RegisteredSchedule>,
    help: RegisteredAction,
}

impl PluginRegistry {
    /// Starts a new registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Plugins in registration order.
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Every command, in (plugin, index) order.
    pub fn commands(&self) -> &[RegisteredAction] {
        &self.commands
    }

    /// Every hear action, in (plugin, index) order.
    pub fn hear_actions(&self) -> &[RegisteredAction] {
        &self.hear_actions
    }

    /// Every scheduled action, in (plugin, index) order.
    pub fn scheduled_actions(&self) -> &[RegisteredSchedule] {
        &self.scheduled
    }

    /// The help command.
    pub fn help(&self) -> &RegisteredAction {
        &self.help
    }

    /// Actions to evaluate for a message, in evaluation order.
    ///
    /// In command context the help command comes last.
    pub fn candidates(
        &self,
        context: MessageContext,
    ) -> Box<dyn Iterator<Item = &RegisteredAction> + Send + '_> {
        match context {
            MessageContext::Command => {
                Box::new(self.commands.iter().chain(std::iter::once(&self.help)))
            }
            MessageContext::Hear => Box::new(self.hear_actions.iter()),
        }
    }

    /// The help text.
    pub fn help_text(&self) -> String {
        help::render_help(&self.commands, &self.hear_actions, &self.scheduled)
    }

    /// Runs every plugin's shutdown hook, last registered first.
    pub async fn close_all(&self) {
        for plugin in self.plugins.iter().rev() {
            plugin.close().await;
            info!(plugin = %plugin.name(), "Plugin closed");
        }
    }
}
