//! The built-in help command and default reply.

use std::fmt::Write as _;

use tartan_core::Answer;

use crate::action::{ActionDefinition, ActionId};
use crate::registry::{RegisteredAction, RegisteredSchedule};

/// Reply sent when a message addressed to the bot matched no command.
pub const DEFAULT_REPLY: &str = "I don't understand. Ask me for \"help\" to get a list of things I do";

/// The default reply as an answer.
pub fn default_answer() -> Answer {
    Answer::new(DEFAULT_REPLY)
}

/// Builds the help command over a finished set of actions.
pub(crate) fn help_action(
    commands: &[RegisteredAction],
    hear_actions: &[RegisteredAction],
    scheduled: &[RegisteredSchedule],
) -> RegisteredAction {
    let text = render_help(commands, hear_actions, scheduled);
    let definition = ActionDefinition::new("help", "Lists what I can do")
        .matching(|msg| msg.normalized_text.eq_ignore_ascii_case("help"))
        .answering(move |_| Some(Answer::new(text.clone())));
    RegisteredAction::new(ActionId::help(), None, definition)
}

/// Renders the help text.
///
/// Lists every visible command and hear action once, then scheduled actions
/// grouped under their plugin name.
pub fn render_help(
    commands: &[RegisteredAction],
    hear_actions: &[RegisteredAction],
    scheduled: &[RegisteredSchedule],
) -> String {
    let commands: Vec<_> = commands.iter().filter(|a| !a.definition().is_hidden()).collect();
    let hear_actions: Vec<_> = hear_actions
        .iter()
        .filter(|a| !a.definition().is_hidden())
        .collect();

    if commands.is_empty() && hear_actions.is_empty() && scheduled.is_empty() {
        return "I don't have anything to offer yet.".to_string();
    }

    let mut out = String::from("Here's what I can do:");

    if !commands.is_empty() {
        out.push_str("\n\n*Commands*");
        for action in commands {
            push_line(&mut out, &action.usage(), action.definition().description());
        }
    }

    if !hear_actions.is_empty() {
        out.push_str("\n\n*Things I listen for*");
        for action in hear_actions {
            push_line(&mut out, &action.usage(), action.definition().description());
        }
    }

    if !scheduled.is_empty() {
        out.push_str("\n\n*Scheduled*");
        let mut current: Option<&str> = None;
        for entry in scheduled {
            if current != Some(entry.plugin()) {
                let _ = write!(out, "\n{}", entry.plugin());
                current = Some(entry.plugin());
            }
            let _ = write!(
                out,
                "\n• {} - {}",
                entry.action().schedule(),
                entry.action().description()
            );
        }
    }

    out
}

fn push_line(out: &mut String, usage: &str, description: &str) {
    if description.is_empty() {
        let _ = write!(out, "\n• `{usage}`");
    } else {
        let _ = write!(out, "\n• `{usage}` - {description}");
    }
}
