//! In-process engine counters.
//!
//! Nothing is exported; [`Metrics::snapshot`] returns an [`EngineStats`]
//! that hosts can log or expose however they like. Outbound capabilities are
//! wrapped in `Instrumented*` decorators that count calls and failures.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tartan_core::{
    ApiResult, BoxedChatDriver, BoxedEmojiReactor, BoxedFileUploader, BoxedRealTimeSender,
    ChatDriver, EmojiReactor, FileUploadParams, FileUploader, MessageId, OutboundMessage,
    RealTimeSender, UploadOption, UploadedFile,
};

// =============================================================================
// Counters
// =============================================================================

/// Calls and failures of one capability.
#[derive(Debug, Default)]
pub struct CallCounter {
    calls: AtomicU64,
    errors: AtomicU64,
}

impl CallCounter {
    fn observe<T>(&self, result: &ApiResult<T>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> CallStats {
        CallStats {
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct PartitionCounter {
    dispatched: AtomicU64,
    dispatch_nanos: AtomicU64,
    processed: AtomicU64,
}

/// Shared engine counters.
#[derive(Debug)]
pub struct Metrics {
    latency_millis: AtomicU64,
    partitions: Vec<PartitionCounter>,
    chat_driver: CallCounter,
    emoji_reactor: CallCounter,
    file_uploader: CallCounter,
    real_time_sender: CallCounter,
    action_panics: AtomicU64,
    malformed_events: AtomicU64,
    scheduled_firings: AtomicU64,
    scheduled_panics: AtomicU64,
}

impl Metrics {
    /// Creates counters for `partitions` lanes.
    pub fn new(partitions: usize) -> Arc<Self> {
        Arc::new(Self {
            latency_millis: AtomicU64::new(0),
            partitions: (0..partitions).map(|_| PartitionCounter::default()).collect(),
            chat_driver: CallCounter::default(),
            emoji_reactor: CallCounter::default(),
            file_uploader: CallCounter::default(),
            real_time_sender: CallCounter::default(),
            action_panics: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
            scheduled_firings: AtomicU64::new(0),
            scheduled_panics: AtomicU64::new(0),
        })
    }

    /// Latest round-trip latency reported by the transport.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_millis.store(millis, Ordering::Relaxed);
    }

    /// One event enqueued on `partition`, taking `elapsed` (including backpressure).
    pub fn record_dispatch(&self, partition: usize, elapsed: Duration) {
        if let Some(p) = self.partitions.get(partition) {
            p.dispatched.fetch_add(1, Ordering::Relaxed);
            let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
            p.dispatch_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    /// One event fully processed by `partition`'s worker.
    pub fn record_processed(&self, partition: usize) {
        if let Some(p) = self.partitions.get(partition) {
            p.processed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_action_panic(&self) {
        self.action_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_firing(&self, panicked: bool) {
        self.scheduled_firings.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.scheduled_panics.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            latency: Duration::from_millis(self.latency_millis.load(Ordering::Relaxed)),
            partitions: self
                .partitions
                .iter()
                .map(|p| PartitionStats {
                    dispatched: p.dispatched.load(Ordering::Relaxed),
                    dispatch_time: Duration::from_nanos(p.dispatch_nanos.load(Ordering::Relaxed)),
                    processed: p.processed.load(Ordering::Relaxed),
                })
                .collect(),
            chat_driver: self.chat_driver.snapshot(),
            emoji_reactor: self.emoji_reactor.snapshot(),
            file_uploader: self.file_uploader.snapshot(),
            real_time_sender: self.real_time_sender.snapshot(),
            action_panics: self.action_panics.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            scheduled_firings: self.scheduled_firings.load(Ordering::Relaxed),
            scheduled_panics: self.scheduled_panics.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Calls and failures of one capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Total calls.
    pub calls: u64,
    /// Failed calls.
    pub errors: u64,
}

/// Counters of one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Events enqueued.
    pub dispatched: u64,
    /// Cumulative time spent enqueueing.
    pub dispatch_time: Duration,
    /// Events processed by the worker.
    pub processed: u64,
}

/// Snapshot of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Latest transport latency.
    pub latency: Duration,
    /// Per-partition counters.
    pub partitions: Vec<PartitionStats>,
    /// Chat driver calls.
    pub chat_driver: CallStats,
    /// Emoji reactor calls.
    pub emoji_reactor: CallStats,
    /// File uploader calls.
    pub file_uploader: CallStats,
    /// Real-time sender calls.
    pub real_time_sender: CallStats,
    /// Contained action panics.
    pub action_panics: u64,
    /// Skipped malformed events.
    pub malformed_events: u64,
    /// Scheduled action firings.
    pub scheduled_firings: u64,
    /// Scheduled action firings that panicked.
    pub scheduled_panics: u64,
}

impl EngineStats {
    /// Events dispatched across all partitions.
    pub fn total_dispatched(&self) -> u64 {
        self.partitions.iter().map(|p| p.dispatched).sum()
    }

    /// Events processed across all partitions.
    pub fn total_processed(&self) -> u64 {
        self.partitions.iter().map(|p| p.processed).sum()
    }
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engine Statistics:")?;
        writeln!(f, "  Latency: {}ms", self.latency.as_millis())?;
        writeln!(
            f,
            "  Events: {} dispatched, {} processed, {} malformed",
            self.total_dispatched(),
            self.total_processed(),
            self.malformed_events
        )?;
        for (i, p) in self.partitions.iter().enumerate() {
            writeln!(
                f,
                "    partition {i}: {} dispatched ({:?} enqueueing), {} processed",
                p.dispatched, p.dispatch_time, p.processed
            )?;
        }
        for (name, c) in [
            ("chat driver", self.chat_driver),
            ("emoji reactor", self.emoji_reactor),
            ("file uploader", self.file_uploader),
            ("real-time sender", self.real_time_sender),
        ] {
            writeln!(f, "  {name}: {} calls, {} errors", c.calls, c.errors)?;
        }
        writeln!(f, "  Action panics: {}", self.action_panics)?;
        write!(
            f,
            "  Scheduled: {} firings, {} panics",
            self.scheduled_firings, self.scheduled_panics
        )
    }
}

// =============================================================================
// Instrumented decorators
// =============================================================================

/// Counts calls through a [`ChatDriver`].
pub struct InstrumentedChatDriver {
    inner: BoxedChatDriver,
    metrics: Arc<Metrics>,
}

impl InstrumentedChatDriver {
    /// Wraps `inner`.
    pub fn new(inner: BoxedChatDriver, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl ChatDriver for InstrumentedChatDriver {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> ApiResult<MessageId> {
        let result = self.inner.send_message(channel_id, message).await;
        self.metrics.chat_driver.observe(&result);
        result
    }

    async fn send_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &OutboundMessage,
    ) -> ApiResult<()> {
        let result = self.inner.send_ephemeral(channel_id, user_id, message).await;
        self.metrics.chat_driver.observe(&result);
        result
    }

    async fn update_message(
        &self,
        target: &MessageId,
        message: &OutboundMessage,
    ) -> ApiResult<MessageId> {
        let result = self.inner.update_message(target, message).await;
        self.metrics.chat_driver.observe(&result);
        result
    }

    async fn delete_message(&self, target: &MessageId) -> ApiResult<()> {
        let result = self.inner.delete_message(target).await;
        self.metrics.chat_driver.observe(&result);
        result
    }
}

/// Counts calls through an [`EmojiReactor`].
pub struct InstrumentedEmojiReactor {
    inner: BoxedEmojiReactor,
    metrics: Arc<Metrics>,
}

impl InstrumentedEmojiReactor {
    /// Wraps `inner`.
    pub fn new(inner: BoxedEmojiReactor, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl EmojiReactor for InstrumentedEmojiReactor {
    async fn add_reaction(&self, name: &str, item: &MessageId) -> ApiResult<()> {
        let result = self.inner.add_reaction(name, item).await;
        self.metrics.emoji_reactor.observe(&result);
        result
    }
}

/// Counts calls through a [`FileUploader`].
pub struct InstrumentedFileUploader {
    inner: BoxedFileUploader,
    metrics: Arc<Metrics>,
}

impl InstrumentedFileUploader {
    /// Wraps `inner`.
    pub fn new(inner: BoxedFileUploader, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl FileUploader for InstrumentedFileUploader {
    async fn upload_file(
        &self,
        params: FileUploadParams,
        options: &[UploadOption],
    ) -> ApiResult<UploadedFile> {
        let result = self.inner.upload_file(params, options).await;
        self.metrics.file_uploader.observe(&result);
        result
    }
}

/// Counts calls through a [`RealTimeSender`].
pub struct InstrumentedRealTimeSender {
    inner: BoxedRealTimeSender,
    metrics: Arc<Metrics>,
}

impl InstrumentedRealTimeSender {
    /// Wraps `inner`.
    pub fn new(inner: BoxedRealTimeSender, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl RealTimeSender for InstrumentedRealTimeSender {
    async fn send_new_message(&self, text: &str, channel_id: &str) -> ApiResult<()> {
        let result = self.inner.send_new_message(text, channel_id).await;
        self.metrics.real_time_sender.observe(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_display() {
        let metrics = Metrics::new(2);
        metrics.set_latency(Duration::from_millis(42));
        metrics.record_dispatch(1, Duration::from_micros(5));
        metrics.record_processed(1);
        metrics.record_dispatch(7, Duration::from_micros(5));
        metrics.chat_driver.observe::<()>(&Ok(()));
        metrics.chat_driver.observe::<()>(&Err(tartan_core::ApiError::Timeout));
        metrics.record_firing(true);

        let stats = metrics.snapshot();
        assert_eq!(stats.latency, Duration::from_millis(42));
        assert_eq!(stats.total_dispatched(), 1);
        assert_eq!(stats.partitions[1].processed, 1);
        assert_eq!(
            stats.chat_driver,
            CallStats {
                calls: 2,
                errors: 1
            }
        );
        assert_eq!(stats.scheduled_panics, 1);

        let text = stats.to_string();
        assert!(text.contains("Latency: 42ms"));
        assert!(text.contains("chat driver: 2 calls, 1 errors"));
    }
}
