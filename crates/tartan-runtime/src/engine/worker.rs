//! Partition workers.
//!
//! One worker per partition drains its queue serially until the router drops
//! the sending half and the queue is empty.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tartan_core::MessageEvent;
use tartan_framework::panic_message;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info_span};

use super::instrumentation::Metrics;
use super::processor::MessageProcessor;

/// Processes every event of one partition, in order.
pub async fn run_worker(
    partition: usize,
    mut rx: mpsc::Receiver<MessageEvent>,
    processor: Arc<MessageProcessor>,
    metrics: Arc<Metrics>,
) {
    debug!(partition, "Worker started");

    while let Some(event) = rx.recv().await {
        let origin = event.origin_id();
        let span = info_span!("event", partition, origin = %origin);

        let outcome = AssertUnwindSafe(processor.process(event))
            .catch_unwind()
            .instrument(span)
            .await;
        if let Err(payload) = outcome {
            error!(
                partition,
                origin = %origin,
                message = %panic_message(payload.as_ref()),
                "Event processing panicked"
            );
        }
        metrics.record_processed(partition);
    }

    debug!(partition, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use parking_lot::{Mutex, RwLock};
    use tartan_core::SelfIdentity;
    use tartan_framework::{ActionDefinition, Plugin, PluginRegistry};

    use super::*;
    use crate::engine::processor::ReplySettings;
    use crate::engine::test_support::RecordingDriver;
    use crate::engine::tracker::ResponseTracker;

    #[tokio::test]
    async fn test_worker_drains_queue_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let plugin = Plugin::new("log").hear(
            ActionDefinition::new("*", "logs everything")
                .matching(|_| true)
                .answering(move |m| {
                    log.lock().push(m.normalized_text.clone());
                    None
                }),
        );
        let registry = PluginRegistry::builder().with(plugin).unwrap().build();
        let metrics = Metrics::new(1);
        let processor = Arc::new(MessageProcessor::new(
            Arc::new(registry),
            Arc::new(ResponseTracker::new(None)),
            Arc::new(RecordingDriver::new()),
            Arc::new(RwLock::new(Some(SelfIdentity::new("BOT", "tartan")))),
            ReplySettings::default(),
            Arc::clone(&metrics),
        ));

        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(run_worker(0, rx, processor, Arc::clone(&metrics)));
        for i in 0..10 {
            tx.send(MessageEvent::new("C1", format!("{i}.0"), "U1", format!("m{i}")))
                .await
                .unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(*seen.lock(), expected);
        assert_eq!(metrics.snapshot().partitions[0].processed, 10);
    }
}
