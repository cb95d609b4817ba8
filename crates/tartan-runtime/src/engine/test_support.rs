//! Recording fakes shared by the engine and runtime tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tartan_core::{
    Answer, AnswerOption, ApiError, ApiResult, ChatDriver, EmojiReactor, FileUploadParams,
    FileUploader, IncomingMessage, MessageId, OutboundMessage, RealTimeSender, UploadOption,
    UploadedFile, UserInfoError, UserInfoFinder, UserInfoResult, UserProfile,
};
use tartan_framework::{ActionDefinition, MemoryStorer, Plugin, StringStorer};

// ─── Chat driver ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DriverCall {
    Send {
        channel_id: String,
        message: OutboundMessage,
    },
    Ephemeral {
        channel_id: String,
        user_id: String,
        message: OutboundMessage,
    },
    Update {
        target: MessageId,
        message: OutboundMessage,
    },
    Delete {
        target: MessageId,
    },
}

/// Records every successful call. Sent messages get timestamps `200.0`,
/// `201.0`, ... in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingDriver {
    calls: Mutex<Vec<DriverCall>>,
    next_ts: AtomicUsize,
    failures: AtomicUsize,
}

impl RecordingDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls fail with a timeout.
    pub(crate) fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                DriverCall::Send { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn sent_texts(&self) -> Vec<String> {
        self.sent_messages().into_iter().map(|m| m.text).collect()
    }

    fn check(&self) -> ApiResult<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(ApiError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatDriver for RecordingDriver {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> ApiResult<MessageId> {
        self.check()?;
        let ts = 200 + self.next_ts.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(DriverCall::Send {
            channel_id: channel_id.to_string(),
            message: message.clone(),
        });
        Ok(MessageId::new(channel_id, format!("{ts}.0")))
    }

    async fn send_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &OutboundMessage,
    ) -> ApiResult<()> {
        self.check()?;
        self.calls.lock().push(DriverCall::Ephemeral {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn update_message(
        &self,
        target: &MessageId,
        message: &OutboundMessage,
    ) -> ApiResult<MessageId> {
        self.check()?;
        self.calls.lock().push(DriverCall::Update {
            target: target.clone(),
            message: message.clone(),
        });
        Ok(target.clone())
    }

    async fn delete_message(&self, target: &MessageId) -> ApiResult<()> {
        self.check()?;
        self.calls.lock().push(DriverCall::Delete {
            target: target.clone(),
        });
        Ok(())
    }
}

// ─── Other capabilities ────────────────────────────────────────────

/// Collects `(channel, text)` pairs.
#[derive(Debug, Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl RealTimeSender for RecordingSender {
    async fn send_new_message(&self, text: &str, channel_id: &str) -> ApiResult<()> {
        self.sent
            .lock()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingReactor {
    reactions: Mutex<Vec<(String, MessageId)>>,
}

impl RecordingReactor {
    pub(crate) fn reactions(&self) -> Vec<(String, MessageId)> {
        self.reactions.lock().clone()
    }
}

#[async_trait]
impl EmojiReactor for RecordingReactor {
    async fn add_reaction(&self, name: &str, item: &MessageId) -> ApiResult<()> {
        self.reactions.lock().push((name.to_string(), item.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingUploader {
    uploads: Mutex<Vec<FileUploadParams>>,
}

impl RecordingUploader {
    pub(crate) fn uploads(&self) -> Vec<FileUploadParams> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl FileUploader for RecordingUploader {
    async fn upload_file(
        &self,
        mut params: FileUploadParams,
        options: &[UploadOption],
    ) -> ApiResult<UploadedFile> {
        for option in options {
            option.apply(&mut params);
        }
        let id = format!("F{}", self.uploads.lock().len());
        let name = params.filename.clone();
        self.uploads.lock().push(params);
        Ok(UploadedFile {
            id,
            name,
            permalink: None,
        })
    }
}

/// A user directory that counts loads per user id.
#[derive(Debug, Default)]
pub(crate) struct CountingDirectory {
    loads: Mutex<HashMap<String, usize>>,
    failing: Mutex<Vec<String>>,
}

impl CountingDirectory {
    pub(crate) fn loads(&self, user_id: &str) -> usize {
        self.loads.lock().get(user_id).copied().unwrap_or(0)
    }

    pub(crate) fn total_loads(&self) -> usize {
        self.loads.lock().values().sum()
    }

    /// Makes lookups of `user_id` fail with a transport error.
    pub(crate) fn fail_for(&self, user_id: &str) {
        self.failing.lock().push(user_id.to_string());
    }
}

#[async_trait]
impl UserInfoFinder for CountingDirectory {
    async fn get_user(&self, user_id: &str) -> UserInfoResult<UserProfile> {
        *self.loads.lock().entry(user_id.to_string()).or_default() += 1;
        if self.failing.lock().iter().any(|u| u == user_id) {
            return Err(ApiError::Transport("directory unavailable".into()).into());
        }
        if user_id.starts_with("GHOST") {
            return Err(UserInfoError::not_found(user_id));
        }
        Ok(UserProfile::new(user_id, user_id.to_lowercase(), user_id))
    }
}

// ─── Plugins ───────────────────────────────────────────────────────

fn karma_target(msg: &IncomingMessage) -> Option<String> {
    let target = msg.normalized_text.strip_suffix("++")?;
    let target = target
        .strip_prefix("<@")
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(target);
    (!target.is_empty() && !target.contains(char::is_whitespace)).then(|| target.to_string())
}

/// A karma plugin: `thing++` increments `karma:thing`; nobody may give
/// karma to themselves.
pub(crate) fn karma_plugin() -> (Plugin, Arc<MemoryStorer>) {
    let storage = Arc::new(MemoryStorer::new());
    let store = Arc::clone(&storage);

    let plugin = Plugin::new("karma").hear(
        ActionDefinition::new("<thing>++", "Gives karma to a thing")
            .matching(|m| karma_target(m).is_some())
            .answering_async(move |msg: IncomingMessage| {
                let store = Arc::clone(&store);
                async move {
                    let Some(target) = karma_target(&msg) else {
                        return None;
                    };
                    if target == msg.user_id {
                        return Some(
                            Answer::new("Sorry, you can't give karma to yourself")
                                .with(AnswerOption::EphemeralToUser(msg.user_id.clone())),
                        );
                    }

                    let key = format!("karma:{target}");
                    let current = store
                        .get_string(&key)
                        .await
                        .ok()
                        .flatten()
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0);
                    let next = current + 1;
                    if store.put_string(&key, &next.to_string()).await.is_err() {
                        return None;
                    }
                    Some(Answer::new(format!("`{target}` just gained a level (`{target}`: {next})")))
                }
            }),
    );
    (plugin, storage)
}
