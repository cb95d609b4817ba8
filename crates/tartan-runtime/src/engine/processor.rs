//! Message processing: addressing, action evaluation and reply reconciliation.
//!
//! A worker hands every event of its partition to [`MessageProcessor::process`]:
//!
//! 1. Classify the event (new, edited, deleted, reply ack, malformed)
//! 2. Build the [`IncomingMessage`] and decide whether the bot was addressed
//! 3. Evaluate the candidate actions in registration order
//! 4. Reconcile the answers with what was posted for the same origin before
//!
//! Reconciliation against the previous record of an origin:
//!
//! | action answered now | recorded before | driver call           |
//! |---------------------|-----------------|-----------------------|
//! | yes                 | no              | `send_message`        |
//! | yes                 | yes             | `update_message`      |
//! | no                  | yes             | `delete_message`      |
//! | ephemeral           | any             | `send_ephemeral`      |
//!
//! The record is rewritten afterwards with only the operations the driver
//! confirmed.

use std::sync::Arc;

use parking_lot::RwLock;
use tartan_core::{
    Answer, BoxedChatDriver, IncomingMessage, MessageEvent, MessageId, MessageKind,
    OutboundMessage, SelfIdentity, is_direct_channel,
};
use tartan_framework::{
    ActionId, Evaluation, MessageContext, PanicStage, PluginRegistry, default_answer,
};
use tracing::{debug, trace, warn};

use super::instrumentation::Metrics;
use super::tracker::{ResponseEntry, ResponseTracker};

/// The bot's own identity, filled in once the connection is established.
pub type SharedIdentity = Arc<RwLock<Option<SelfIdentity>>>;

/// Reply defaults from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplySettings {
    /// Thread replies unless the answer says otherwise.
    pub threaded_replies: bool,
    /// Broadcast threaded replies unless the answer says otherwise.
    pub broadcast_threaded_replies: bool,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            threaded_replies: false,
            broadcast_threaded_replies: true,
        }
    }
}

/// Turns message events into chat driver calls.
pub struct MessageProcessor {
    registry: Arc<PluginRegistry>,
    tracker: Arc<ResponseTracker>,
    driver: BoxedChatDriver,
    identity: SharedIdentity,
    settings: ReplySettings,
    metrics: Arc<Metrics>,
}

impl MessageProcessor {
    /// Creates a processor.
    pub fn new(
        registry: Arc<PluginRegistry>,
        tracker: Arc<ResponseTracker>,
        driver: BoxedChatDriver,
        identity: SharedIdentity,
        settings: ReplySettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            tracker,
            driver,
            identity,
            settings,
            metrics,
        }
    }

    /// Processes one event to completion.
    pub async fn process(&self, event: MessageEvent) {
        let kind = match event.kind() {
            Ok(kind) => kind,
            Err(e) => {
                self.metrics.record_malformed();
                warn!(error = %e, "Skipping malformed message event");
                return;
            }
        };

        match kind {
            MessageKind::ReplyAck => {
                trace!(reply_to = ?event.reply_to, "Ignoring reply acknowledgement");
            }
            MessageKind::Deleted => self.revoke(&event.origin_id()).await,
            MessageKind::New | MessageKind::Changed => self.respond(event).await,
        }
    }

    // ─── Addressing ────────────────────────────────────────────────

    /// Builds the message plugins see and decides how it was addressed.
    fn incoming(&self, event: MessageEvent) -> (IncomingMessage, MessageContext) {
        let msg_id = event.event_id();
        let original_msg_id = event.origin_id();

        let mention = self
            .identity
            .read()
            .as_ref()
            .and_then(|me| me.strip_mention(&event.text).map(str::to_string));

        let context = if is_direct_channel(&event.channel_id) || mention.is_some() {
            MessageContext::Command
        } else {
            MessageContext::Hear
        };
        let normalized_text = mention.unwrap_or_else(|| event.text.trim().to_string());

        let msg = IncomingMessage {
            msg_id,
            user_id: event.user_id,
            channel_id: event.channel_id,
            raw_text: event.text,
            normalized_text,
            thread_timestamp: event.thread_timestamp,
            subtype: event.subtype,
            original_msg_id,
        };
        (msg, context)
    }

    // ─── Evaluation ────────────────────────────────────────────────

    /// Runs every candidate action and collects the non-empty answers.
    async fn evaluate(
        &self,
        msg: &IncomingMessage,
        context: MessageContext,
    ) -> Vec<(ActionId, Answer)> {
        let mut answers = Vec::new();
        let mut matched = false;

        for action in self.registry.candidates(context) {
            match action.evaluate(msg).await {
                Ok(Evaluation::NoMatch) => {}
                Ok(Evaluation::Matched(answer)) => {
                    matched = true;
                    match answer {
                        Some(answer) if !answer.is_empty() => {
                            answers.push((action.id().clone(), answer));
                        }
                        _ => debug!(action = %action.id(), "Action matched without an answer"),
                    }
                }
                Err(panic) => {
                    self.metrics.record_action_panic();
                    warn!(
                        origin = %msg.original_msg_id,
                        action = %panic.action,
                        stage = %panic.stage,
                        message = %panic.message,
                        "Action panicked"
                    );
                    // An answerer only runs after a match.
                    if panic.stage == PanicStage::Answering {
                        matched = true;
                    }
                }
            }
        }

        if context == MessageContext::Command && !matched {
            answers.push((ActionId::default_action(), default_answer()));
        }
        answers
    }

    // ─── Reconciliation ────────────────────────────────────────────

    async fn respond(&self, event: MessageEvent) {
        let origin = event.origin_id();
        let (msg, context) = self.incoming(event);
        let answers = self.evaluate(&msg, context).await;
        let prior = self.tracker.lookup(&origin).unwrap_or_default();

        if answers.is_empty() && prior.is_empty() {
            return;
        }

        let mut next: Vec<ResponseEntry> = Vec::with_capacity(answers.len());
        for (action, answer) in answers {
            if let Some(user) = &answer.options.ephemeral_to_user {
                let outbound = self.outbound(&msg, &answer);
                if let Err(e) = self
                    .driver
                    .send_ephemeral(&msg.channel_id, user, &outbound)
                    .await
                {
                    warn!(origin = %origin, action = %action, error = %e, "Failed to send ephemeral reply");
                }
                continue;
            }

            match prior.iter().find(|entry| entry.action == action) {
                Some(entry) => {
                    let update = Self::update(&answer);
                    match self.driver.update_message(&entry.outbound, &update).await {
                        Ok(id) => next.push(ResponseEntry::new(action, id)),
                        Err(e) => {
                            warn!(
                                origin = %origin,
                                action = %action,
                                target = %entry.outbound,
                                error = %e,
                                "Failed to update reply"
                            );
                            next.push(entry.clone());
                        }
                    }
                }
                None => {
                    let outbound = self.outbound(&msg, &answer);
                    match self.driver.send_message(&msg.channel_id, &outbound).await {
                        Ok(id) => next.push(ResponseEntry::new(action, id)),
                        Err(e) => {
                            warn!(origin = %origin, action = %action, error = %e, "Failed to send reply");
                        }
                    }
                }
            }
        }

        for entry in &prior {
            if next.iter().any(|kept| kept.action == entry.action) {
                continue;
            }
            if let Err(e) = self.driver.delete_message(&entry.outbound).await {
                warn!(
                    origin = %origin,
                    action = %entry.action,
                    target = %entry.outbound,
                    error = %e,
                    "Failed to delete stale reply"
                );
                next.push(entry.clone());
            }
        }

        self.tracker.replace(origin, next);
    }

    /// Deletes every reply to a deleted message and forgets it.
    async fn revoke(&self, origin: &MessageId) {
        let Some(entries) = self.tracker.remove(origin) else {
            trace!(origin = %origin, "Deleted message had no replies");
            return;
        };

        for entry in entries {
            if let Err(e) = self.driver.delete_message(&entry.outbound).await {
                warn!(
                    origin = %origin,
                    action = %entry.action,
                    target = %entry.outbound,
                    error = %e,
                    "Failed to delete reply"
                );
            }
        }
    }

    // ─── Delivery ──────────────────────────────────────────────────

    /// Resolves threading and broadcast for a new reply.
    fn outbound(&self, msg: &IncomingMessage, answer: &Answer) -> OutboundMessage {
        let options = &answer.options;
        let threaded = options
            .threaded_reply
            .unwrap_or(self.settings.threaded_replies);

        let thread_timestamp = options
            .existing_thread_timestamp
            .clone()
            .or_else(|| msg.thread_timestamp.clone())
            .or_else(|| threaded.then(|| msg.original_msg_id.timestamp.clone()));
        let broadcast = thread_timestamp.is_some()
            && options
                .broadcast
                .unwrap_or(self.settings.broadcast_threaded_replies);

        OutboundMessage {
            text: answer.text.clone(),
            blocks: answer.content_blocks.clone(),
            thread_timestamp,
            broadcast,
            extra: options.extra.clone(),
        }
    }

    /// Content of an in-place update; updates never move a reply.
    fn update(answer: &Answer) -> OutboundMessage {
        OutboundMessage {
            text: answer.text.clone(),
            blocks: answer.content_blocks.clone(),
            thread_timestamp: None,
            broadcast: false,
            extra: answer.options.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tartan_core::{AnswerOption, MessageReference};
    use tartan_framework::{ActionDefinition, DEFAULT_REPLY, Plugin, StringStorer};

    use super::*;
    use crate::engine::test_support::{DriverCall, RecordingDriver, karma_plugin};

    struct Harness {
        processor: MessageProcessor,
        driver: Arc<RecordingDriver>,
        tracker: Arc<ResponseTracker>,
        metrics: Arc<Metrics>,
    }

    fn harness(plugins: Vec<Plugin>, settings: ReplySettings) -> Harness {
        let mut builder = PluginRegistry::builder();
        for plugin in plugins {
            builder.register(plugin).unwrap();
        }
        let driver = Arc::new(RecordingDriver::new());
        let tracker = Arc::new(ResponseTracker::new(None));
        let metrics = Metrics::new(1);
        let identity: SharedIdentity =
            Arc::new(RwLock::new(Some(SelfIdentity::new("BOT", "tartan"))));
        let processor = MessageProcessor::new(
            Arc::new(builder.build()),
            Arc::clone(&tracker),
            driver.clone(),
            identity,
            settings,
            Arc::clone(&metrics),
        );
        Harness {
            processor,
            driver,
            tracker,
            metrics,
        }
    }

    /// Answers `I'm X, version <text>` to "version <text>".
    fn version_plugin() -> Plugin {
        Plugin::new("version").command(
            ActionDefinition::new("version", "Reports the version")
                .matching(|m| m.normalized_text.starts_with("version"))
                .answering(|m| {
                    let v = m.normalized_text.trim_start_matches("version").trim();
                    Some(Answer::new(format!("I'm X, version {v}")))
                }),
        )
    }

    /// Hear action echoing any text that contains `word`.
    fn echo_plugin(name: &str, word: &'static str) -> Plugin {
        Plugin::new(name.to_string()).hear(
            ActionDefinition::new(word, "echo")
                .matching(move |m| m.normalized_text.contains(word))
                .answering(|m| Some(Answer::new(m.normalized_text.clone()))),
        )
    }

    // ─── Addressing ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_mention_becomes_command() {
        let h = harness(vec![version_plugin()], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "<@BOT> version 1.0.0"))
            .await;
        assert_eq!(h.driver.sent_texts(), vec!["I'm X, version 1.0.0"]);
    }

    #[tokio::test]
    async fn test_direct_channel_is_command_context() {
        let h = harness(vec![version_plugin()], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("D42", "1.0", "U1", "version 2"))
            .await;
        h.processor
            .process(MessageEvent::new("D42", "2.0", "U1", "tartan: version 3"))
            .await;
        assert_eq!(
            h.driver.sent_texts(),
            vec!["I'm X, version 2", "I'm X, version 3"]
        );
    }

    #[tokio::test]
    async fn test_unaddressed_text_is_only_heard() {
        let h = harness(
            vec![version_plugin(), echo_plugin("echo", "version")],
            ReplySettings::default(),
        );
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "version 9"))
            .await;
        // The command is not evaluated, the hear action is.
        assert_eq!(h.driver.sent_texts(), vec!["version 9"]);
    }

    #[tokio::test]
    async fn test_unmatched_gets_default_reply() {
        let h = harness(vec![version_plugin()], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "<@BOT> dance"))
            .await;
        assert_eq!(h.driver.sent_texts(), vec![DEFAULT_REPLY]);
        let entries = h.tracker.lookup(&MessageId::new("C1", "1.0")).unwrap();
        assert_eq!(entries[0].action, ActionId::default_action());
    }

    #[tokio::test]
    async fn test_help_is_answered_in_command_context() {
        let h = harness(vec![version_plugin()], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "<@BOT> help"))
            .await;
        let texts = h.driver.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("`version`"));
    }

    // ─── Answers ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_answers_produce_no_call() {
        let plugin = Plugin::new("quiet").hear(
            ActionDefinition::new("quiet", "says nothing")
                .matching(|_| true)
                .answering(|_| Some(Answer::new(""))),
        );
        let h = harness(vec![plugin], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "anything"))
            .await;
        assert!(h.driver.calls().is_empty());
        assert!(h.tracker.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_action_does_not_stop_the_others() {
        let plugin = Plugin::new("boom")
            .hear(
                ActionDefinition::new("boom", "panics")
                    .matching(|_| panic!("matcher exploded"))
                    .answering(|_| None),
            )
            .hear(
                ActionDefinition::new("after", "still runs")
                    .matching(|_| true)
                    .answering(|_| Some(Answer::new("still here"))),
            );
        let h = harness(vec![plugin], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "go"))
            .await;
        assert_eq!(h.driver.sent_texts(), vec!["still here"]);
        assert_eq!(h.metrics.snapshot().action_panics, 1);
    }

    #[tokio::test]
    async fn test_self_karma_is_refused_ephemerally() {
        let (plugin, storage) = karma_plugin();
        let h = harness(vec![plugin], ReplySettings::default());

        h.processor
            .process(MessageEvent::new("C1", "299.0", "U1", "BOT++"))
            .await;
        h.processor
            .process(MessageEvent::new("C1", "300.0", "BOT", "BOT++"))
            .await;

        let calls = h.driver.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], DriverCall::Send { .. }));
        match &calls[1] {
            DriverCall::Ephemeral {
                user_id, message, ..
            } => {
                assert_eq!(user_id, "BOT");
                assert!(message.text.contains("yourself"));
            }
            other => panic!("expected an ephemeral refusal, got {other:?}"),
        }
        assert!(!h.tracker.contains(&MessageId::new("C1", "300.0")));
        assert_eq!(
            storage.get_string("karma:BOT").await.unwrap().as_deref(),
            Some("1")
        );
    }

    // ─── Threading ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_threading_resolution() {
        let plugin = Plugin::new("thread")
            .hear(
                ActionDefinition::new("a", "threaded")
                    .matching(|m| m.normalized_text == "threaded")
                    .answering(|_| {
                        Some(Answer::new("t").with(AnswerOption::ThreadedReply(true)))
                    }),
            )
            .hear(
                ActionDefinition::new("b", "existing")
                    .matching(|m| m.normalized_text == "existing")
                    .answering(|_| {
                        Some(
                            Answer::new("e")
                                .with(AnswerOption::ExistingThreadTimestamp("42.0".into()))
                                .with(AnswerOption::Broadcast(false)),
                        )
                    }),
            )
            .hear(
                ActionDefinition::new("c", "plain")
                    .matching(|m| m.normalized_text == "plain")
                    .answering(|_| Some(Answer::new("p"))),
            );
        let h = harness(vec![plugin], ReplySettings::default());

        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "threaded"))
            .await;
        h.processor
            .process(MessageEvent::new("C1", "2.0", "U1", "existing"))
            .await;
        h.processor
            .process(MessageEvent::new("C1", "3.0", "U1", "plain"))
            .await;
        h.processor
            .process(MessageEvent::new("C1", "4.0", "U1", "plain").in_thread("0.5"))
            .await;

        let sent = h.driver.sent_messages();
        assert_eq!(sent[0].thread_timestamp.as_deref(), Some("1.0"));
        assert!(sent[0].broadcast);
        assert_eq!(sent[1].thread_timestamp.as_deref(), Some("42.0"));
        assert!(!sent[1].broadcast);
        assert_eq!(sent[2].thread_timestamp, None);
        assert!(!sent[2].broadcast);
        assert_eq!(sent[3].thread_timestamp.as_deref(), Some("0.5"));
    }

    #[tokio::test]
    async fn test_threaded_replies_default_comes_from_settings() {
        let h = harness(
            vec![echo_plugin("echo", "hi")],
            ReplySettings {
                threaded_replies: true,
                broadcast_threaded_replies: false,
            },
        );
        h.processor
            .process(MessageEvent::new("C1", "7.0", "U1", "hi"))
            .await;
        let sent = h.driver.sent_messages();
        assert_eq!(sent[0].thread_timestamp.as_deref(), Some("7.0"));
        assert!(!sent[0].broadcast);
    }

    // ─── Reconciliation ────────────────────────────────────────────

    #[tokio::test]
    async fn test_edit_updates_adds_and_deletes() {
        let h = harness(
            vec![
                echo_plugin("apple", "apple"),
                echo_plugin("banana", "banana"),
                echo_plugin("cherry", "cherry"),
            ],
            ReplySettings::default(),
        );
        let origin = MessageId::new("C1", "100.0");

        h.processor
            .process(MessageEvent::new("C1", "100.0", "U1", "apple banana"))
            .await;
        assert_eq!(h.driver.calls().len(), 2);

        h.processor
            .process(MessageEvent::edit("C1", "150.0", "100.0", "U1", "banana cherry"))
            .await;

        let calls = h.driver.calls();
        let after_edit = &calls[2..];
        assert_eq!(after_edit.len(), 3);
        assert!(matches!(
            &after_edit[0],
            DriverCall::Update { target, message } if target.timestamp == "201.0" && message.text == "banana cherry"
        ));
        assert!(matches!(&after_edit[1], DriverCall::Send { message, .. } if message.text == "banana cherry"));
        assert!(matches!(&after_edit[2], DriverCall::Delete { target } if target.timestamp == "200.0"));

        let entries = h.tracker.lookup(&origin).unwrap();
        let plugins: Vec<&str> = entries.iter().map(|e| e.action.plugin.as_ref()).collect();
        assert_eq!(plugins, vec!["banana", "cherry"]);
    }

    #[tokio::test]
    async fn test_delete_removes_every_reply() {
        let h = harness(
            vec![echo_plugin("a", "x"), echo_plugin("b", "x"), echo_plugin("c", "x")],
            ReplySettings::default(),
        );
        h.processor
            .process(MessageEvent::new("C1", "100.0", "U1", "x"))
            .await;
        h.processor
            .process(MessageEvent::delete("C1", "160.0", "100.0"))
            .await;

        let deletes = h
            .driver
            .calls()
            .into_iter()
            .filter(|c| matches!(c, DriverCall::Delete { .. }))
            .count();
        assert_eq!(deletes, 3);
        assert!(!h.tracker.contains(&MessageId::new("C1", "100.0")));
    }

    #[tokio::test]
    async fn test_failed_send_is_not_recorded() {
        let h = harness(vec![echo_plugin("echo", "hi")], ReplySettings::default());
        h.driver.fail_next(1);
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "hi"))
            .await;
        assert!(h.tracker.is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_prior_entry() {
        let h = harness(vec![echo_plugin("echo", "hi")], ReplySettings::default());
        h.processor
            .process(MessageEvent::new("C1", "1.0", "U1", "hi"))
            .await;
        h.driver.fail_next(1);
        h.processor
            .process(MessageEvent::edit("C1", "2.0", "1.0", "U1", "hi again"))
            .await;
        let entries = h.tracker.lookup(&MessageId::new("C1", "1.0")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outbound.timestamp, "200.0");
    }

    #[tokio::test]
    async fn test_malformed_events_are_skipped() {
        let h = harness(vec![echo_plugin("echo", "hi")], ReplySettings::default());
        let mut edit = MessageEvent::edit("C1", "2.0", "1.0", "U1", "hi");
        edit.reference = None;
        h.processor.process(edit).await;

        let mut blank = MessageEvent::new("", "1.0", "U1", "hi");
        blank.reference = Some(MessageReference {
            timestamp: "0.1".into(),
            previous_text: None,
        });
        h.processor.process(blank).await;

        assert!(h.driver.calls().is_empty());
        assert_eq!(h.metrics.snapshot().malformed_events, 2);
    }

    #[tokio::test]
    async fn test_reply_acks_are_ignored() {
        let h = harness(vec![echo_plugin("echo", "hi")], ReplySettings::default());
        let mut ack = MessageEvent::new("C1", "1.0", "U1", "hi");
        ack.reply_to = Some(7);
        h.processor.process(ack).await;
        assert!(h.driver.calls().is_empty());
    }
}
