use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tartan_core::BoxedRealTimeSender;

use crate::schedule::Schedule;

/// Job body of a scheduled action.
pub type ScheduledFn = Arc<dyn Fn(BoxedRealTimeSender) -> BoxFuture<'static, ()> + Send + Sync>;

/// A job fired by the scheduler rather than by a message.
///
/// ```rust
/// use chrono::Weekday;
/// use tartan_framework::{Schedule, ScheduledAction};
///
/// let digest = ScheduledAction::new(
///     Schedule::weekly_on(Weekday::Mon).at_str("10:00").unwrap(),
///     "Posts the weekly digest",
///     |sender| async move {
///         let _ = sender.send_new_message("Happy Monday!", "C_GENERAL").await;
///     },
/// );
/// assert_eq!(digest.schedule().to_string(), "Every Monday at 10:00");
/// ```
#[derive(Clone)]
pub struct ScheduledAction {
    schedule: Schedule,
    description: String,
    action: ScheduledFn,
}

impl ScheduledAction {
    /// Creates a scheduled action.
    pub fn new<F, Fut>(schedule: Schedule, description: impl Into<String>, action: F) -> Self
    where
        F: Fn(BoxedRealTimeSender) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            schedule,
            description: description.into(),
            action: Arc::new(move |sender: BoxedRealTimeSender| action(sender).boxed()),
        }
    }

    /// When the action fires.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Description shown in help.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs the job once.
    pub fn run(&self, sender: BoxedRealTimeSender) -> BoxFuture<'static, ()> {
        (self.action)(sender)
    }
}

impl fmt::Debug for ScheduledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledAction")
            .field("schedule", &self.schedule)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
