//! The event loop.
//!
//! [`Engine::run`] consumes the real-time event stream on a single task.
//! Connection-level events are handled inline; message events go to the
//! partition router, which applies backpressure when a lane is full.
//!
//! Shutdown happens in a fixed order, whatever triggered it (termination
//! event, end of stream, invalid credentials or the shutdown token):
//!
//! 1. Drop the router, closing every partition queue
//! 2. Wait for each worker to drain its queue and exit
//! 3. Stop the scheduler
//! 4. Close plugins, last registered first

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tartan_core::{BoxedRealTimeSender, RtmEvent};
use tartan_framework::{PluginRegistry, TimeLocation};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::instrumentation::Metrics;
use super::processor::{MessageProcessor, SharedIdentity};
use super::router::PartitionRouter;
use super::scheduler::SchedulerRunner;
use super::worker::run_worker;
use crate::error::{RuntimeError, RuntimeResult};

/// Lane layout of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Number of partitions, a power of two.
    pub partitions: usize,
    /// Capacity of each partition queue.
    pub queue_buffer: usize,
}

/// Everything the event loop needs, wired together by the runtime builder.
pub struct Engine {
    registry: Arc<PluginRegistry>,
    processor: Arc<MessageProcessor>,
    identity: SharedIdentity,
    sender: BoxedRealTimeSender,
    location: TimeLocation,
    settings: EngineSettings,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

/// Why the event loop stopped.
enum Exit {
    Terminated,
    StreamEnded,
    Cancelled,
    InvalidAuth,
    Failed(RuntimeError),
}

impl Engine {
    /// Creates an engine.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<PluginRegistry>,
        processor: Arc<MessageProcessor>,
        identity: SharedIdentity,
        sender: BoxedRealTimeSender,
        location: TimeLocation,
        settings: EngineSettings,
        metrics: Arc<Metrics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            processor,
            identity,
            sender,
            location,
            settings,
            metrics,
            shutdown,
        }
    }

    /// Consumes `events` until termination, then shuts down in order.
    ///
    /// Returns [`RuntimeError::InvalidAuth`] when the credentials were
    /// rejected; every other way of stopping is `Ok`.
    pub async fn run<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = RtmEvent> + Send + Unpin,
    {
        let (router, receivers) = PartitionRouter::new(
            self.settings.partitions,
            self.settings.queue_buffer,
            Arc::clone(&self.metrics),
        )?;

        let workers: Vec<_> = receivers
            .into_iter()
            .enumerate()
            .map(|(partition, rx)| {
                tokio::spawn(run_worker(
                    partition,
                    rx,
                    Arc::clone(&self.processor),
                    Arc::clone(&self.metrics),
                ))
            })
            .collect();

        let scheduler = SchedulerRunner::start(
            Arc::clone(&self.registry),
            Arc::clone(&self.sender),
            self.location.clone(),
            Arc::clone(&self.metrics),
            &self.shutdown,
        );

        info!(
            partitions = self.settings.partitions,
            queue_buffer = self.settings.queue_buffer,
            plugins = self.registry.plugins().len(),
            "Engine started"
        );

        let exit = self.consume(&router, events).await;

        drop(router);
        for (partition, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!(partition, error = %e, "Worker task failed");
            }
        }
        scheduler.stop().await;
        self.registry.close_all().await;
        info!("Engine stopped");

        match exit {
            Exit::Terminated | Exit::StreamEnded | Exit::Cancelled => Ok(()),
            Exit::InvalidAuth => Err(RuntimeError::InvalidAuth),
            Exit::Failed(e) => Err(e),
        }
    }

    async fn consume<S>(&self, router: &PartitionRouter, mut events: S) -> Exit
    where
        S: Stream<Item = RtmEvent> + Send + Unpin,
    {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    return Exit::Cancelled;
                }
                event = events.next() => event,
            };

            let Some(event) = event else {
                info!("Event stream ended");
                return Exit::StreamEnded;
            };

            match event {
                RtmEvent::Hello => debug!("Connection handshake started"),
                RtmEvent::Connected(me) => {
                    info!(user_id = %me.user_id, user_name = %me.user_name, "Connected");
                    *self.identity.write() = Some(me);
                }
                RtmEvent::LatencyReport { latency } => {
                    trace!(latency_ms = latency.as_millis() as u64, "Latency report");
                    self.metrics.set_latency(latency);
                }
                RtmEvent::RtmError { message } => {
                    warn!(message = %message, "Real-time connection error");
                }
                RtmEvent::InvalidAuth => {
                    error!("Invalid credentials, stopping");
                    return Exit::InvalidAuth;
                }
                RtmEvent::Termination => {
                    info!("Termination requested");
                    return Exit::Terminated;
                }
                RtmEvent::Message(message) => {
                    if let Err(e) = router.dispatch(message).await {
                        error!(error = %e, "Failed to dispatch message");
                        return Exit::Failed(e.into());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::{Mutex, RwLock};
    use tartan_core::{MessageEvent, SelfIdentity};
    use tartan_framework::{ActionDefinition, Plugin};
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::engine::processor::ReplySettings;
    use crate::engine::test_support::{RecordingDriver, RecordingSender};
    use crate::engine::tracker::ResponseTracker;

    fn engine(plugins: Vec<Plugin>, partitions: usize) -> (Engine, Arc<RecordingDriver>) {
        let mut builder = PluginRegistry::builder();
        for plugin in plugins {
            builder.register(plugin).unwrap();
        }
        let registry = Arc::new(builder.build());
        let driver = Arc::new(RecordingDriver::new());
        let identity: SharedIdentity = Arc::new(RwLock::new(None));
        let metrics = Metrics::new(partitions);
        let processor = Arc::new(MessageProcessor::new(
            Arc::clone(&registry),
            Arc::new(ResponseTracker::new(None)),
            driver.clone(),
            Arc::clone(&identity),
            ReplySettings::default(),
            Arc::clone(&metrics),
        ));
        let engine = Engine::new(
            registry,
            processor,
            identity,
            Arc::new(RecordingSender::default()),
            TimeLocation::Local,
            EngineSettings {
                partitions,
                queue_buffer: 2,
            },
            metrics,
            CancellationToken::new(),
        );
        (engine, driver)
    }

    fn version_plugin() -> Plugin {
        Plugin::new("version").command(
            ActionDefinition::new("version", "Reports the version")
                .matching(|m| m.normalized_text == "version")
                .answering(|_| Some(tartan_core::Answer::new("I'm X, version 1.0.0"))),
        )
    }

    #[tokio::test]
    async fn test_connected_identity_enables_mentions() {
        let (engine, driver) = engine(vec![version_plugin()], 1);
        let events = futures::stream::iter(vec![
            RtmEvent::Hello,
            RtmEvent::Connected(SelfIdentity::new("BOT", "tartan")),
            RtmEvent::LatencyReport {
                latency: Duration::from_millis(12),
            },
            RtmEvent::RtmError {
                message: "hiccup".into(),
            },
            RtmEvent::Message(MessageEvent::new("C1", "1.0", "U1", "<@BOT> version")),
            RtmEvent::Termination,
            RtmEvent::Message(MessageEvent::new("C1", "2.0", "U1", "<@BOT> version")),
        ]);

        assert_ok!(engine.run(events).await);
        assert_eq!(driver.sent_texts(), vec!["I'm X, version 1.0.0"]);
        let stats = engine.metrics.snapshot();
        assert_eq!(stats.latency, Duration::from_millis(12));
        assert_eq!(stats.total_processed(), 1);
    }

    #[tokio::test]
    async fn test_invalid_auth_stops_and_reports() {
        let closed = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&closed);
        let plugin = version_plugin().on_close(move || {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock() = true;
            }
        });
        let (engine, driver) = engine(vec![plugin], 2);
        let events = futures::stream::iter(vec![
            RtmEvent::InvalidAuth,
            RtmEvent::Message(MessageEvent::new("D1", "1.0", "U1", "version")),
        ]);

        let err = assert_err!(engine.run(events).await);
        assert!(matches!(err, RuntimeError::InvalidAuth));
        assert!(driver.calls().is_empty());
        assert!(*closed.lock());
    }

    #[tokio::test]
    async fn test_stream_end_drains_workers() {
        let (engine, driver) = engine(vec![version_plugin()], 4);
        let events = futures::stream::iter(
            (0..20)
                .map(|i| RtmEvent::Message(MessageEvent::new("D1", format!("{i}.0"), "U1", "version")))
                .collect::<Vec<_>>(),
        );

        assert_ok!(engine.run(events).await);
        assert_eq!(driver.sent_texts().len(), 20);
        assert_eq!(engine.metrics.snapshot().total_dispatched(), 20);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_a_silent_stream() {
        let (engine, _driver) = engine(vec![version_plugin()], 1);
        let token = engine.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        assert_ok!(engine.run(futures::stream::pending::<RtmEvent>()).await);
    }

    #[tokio::test]
    async fn test_invalid_partition_count_fails_before_consuming() {
        let (mut engine, _driver) = engine(vec![], 1);
        engine.settings.partitions = 3;
        let err = assert_err!(engine.run(futures::stream::empty::<RtmEvent>()).await);
        assert!(err.to_string().contains('3'));
    }
}
