use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tartan_core::{Answer, IncomingMessage};

/// Predicate deciding whether an action applies to a message.
///
/// Must be free of side effects: it may run for messages the action never
/// answers.
pub type MatchFn = Arc<dyn Fn(&IncomingMessage) -> bool + Send + Sync>;

/// Produces the answer for a matched message. `None` means "stay silent".
pub type AnswerFn =
    Arc<dyn Fn(IncomingMessage) -> BoxFuture<'static, Option<Answer>> + Send + Sync>;

/// A reactive behavior: a predicate plus an answerer.
///
/// # Example
///
/// ```rust
/// use tartan_core::Answer;
/// use tartan_framework::ActionDefinition;
///
/// let version = ActionDefinition::new("version", "Shows the bot version")
///     .matching(|msg| msg.normalized_text == "version")
///     .answering(|_| Some(Answer::new("I'm tartan, version 1.0.0")));
///
/// assert_eq!(version.usage(), "version");
/// ```
#[derive(Clone)]
pub struct ActionDefinition {
    usage: String,
    description: String,
    hidden: bool,
    matcher: MatchFn,
    answerer: AnswerFn,
}

impl ActionDefinition {
    /// Creates an action that never matches; chain [`matching`] and
    /// [`answering`] to give it behavior.
    ///
    /// [`matching`]: Self::matching
    /// [`answering`]: Self::answering
    pub fn new(usage: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            usage: usage.into(),
            description: description.into(),
            hidden: false,
            matcher: Arc::new(|_: &IncomingMessage| false),
            answerer: Arc::new(|_: IncomingMessage| {
                futures::future::ready(None::<Answer>).boxed()
            }),
        }
    }

    /// Hides the action from help.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Sets the predicate.
    pub fn matching<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&IncomingMessage) -> bool + Send + Sync + 'static,
    {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Sets a synchronous answerer.
    pub fn answering<F>(mut self, answerer: F) -> Self
    where
        F: Fn(&IncomingMessage) -> Option<Answer> + Send + Sync + 'static,
    {
        self.answerer = Arc::new(move |msg: IncomingMessage| {
            futures::future::ready(answerer(&msg)).boxed()
        });
        self
    }

    /// Sets an asynchronous answerer, for actions that call capabilities.
    pub fn answering_async<F, Fut>(mut self, answerer: F) -> Self
    where
        F: Fn(IncomingMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Answer>> + Send + 'static,
    {
        self.answerer = Arc::new(move |msg: IncomingMessage| answerer(msg).boxed());
        self
    }

    /// Usage line shown in help.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Description shown in help.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether help omits this action.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Runs the predicate.
    pub fn matches(&self, msg: &IncomingMessage) -> bool {
        (self.matcher)(msg)
    }

    /// Runs the answerer.
    pub fn answer(&self, msg: IncomingMessage) -> BoxFuture<'static, Option<Answer>> {
        (self.answerer)(msg)
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("usage", &self.usage)
            .field("description", &self.description)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}
