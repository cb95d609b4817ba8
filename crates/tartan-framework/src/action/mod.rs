//! Plugin actions.
//!
//! Three kinds of behavior a plugin can register:
//!
//! - **commands** ([`ActionDefinition`]) run on messages addressed to the bot;
//! - **hear actions** ([`ActionDefinition`]) run on overheard messages;
//! - **scheduled actions** ([`ScheduledAction`]) run on a [`Schedule`].
//!
//! Every registered command and hear action gets an [`ActionId`].
//!
//! [`Schedule`]: crate::Schedule

mod definition;
mod id;
mod scheduled;

pub use definition::{ActionDefinition, AnswerFn, MatchFn};
pub use id::{ActionId, ActionKind, HELP_PLUGIN};
pub use scheduled::{ScheduledAction, ScheduledFn};
