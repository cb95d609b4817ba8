//! Scheduled-action runner.
//!
//! A single task keeps every scheduled action in a min-heap keyed by its next
//! firing time, sleeps until the earliest one is due and spawns the job on its
//! own task. A job that panics is logged and counted; the runner and the
//! job's later firings are unaffected.
//!
//! ```text
//! heap: (due, job) ──peek──▶ sleep(due - now) ──▶ spawn job(sender)
//!   ▲                                                  │
//!   └──────────── push(next_after(due), job) ◀─────────┘
//! ```

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tartan_core::BoxedRealTimeSender;
use tartan_framework::{PluginRegistry, TimeLocation, panic_message};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::instrumentation::Metrics;

/// Wall clock anchored to the tokio clock, so paused time in tests moves both.
#[derive(Debug, Clone, Copy)]
struct Clock {
    wall: DateTime<Utc>,
    instant: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            instant: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.instant.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

/// Outcome of one firing: job index and panic message, if any.
type Firing = (usize, Option<String>);

/// Handle to the running scheduler task.
#[derive(Debug)]
pub struct SchedulerRunner {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SchedulerRunner {
    /// Starts firing every scheduled action of `registry`.
    ///
    /// The runner stops when `shutdown` is cancelled or [`stop`](Self::stop)
    /// is called.
    pub fn start(
        registry: Arc<PluginRegistry>,
        sender: BoxedRealTimeSender,
        location: TimeLocation,
        metrics: Arc<Metrics>,
        shutdown: &CancellationToken,
    ) -> Self {
        let cancel = shutdown.child_token();
        let handle = if registry.scheduled_actions().is_empty() {
            debug!("No scheduled actions");
            None
        } else {
            Some(tokio::spawn(run_schedule(
                registry,
                sender,
                location,
                metrics,
                cancel.clone(),
            )))
        };
        Self { cancel, handle }
    }

    /// Stops the runner and waits for in-flight firings to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "Scheduler task failed");
        }
    }
}

async fn run_schedule(
    registry: Arc<PluginRegistry>,
    sender: BoxedRealTimeSender,
    location: TimeLocation,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) {
    let jobs = registry.scheduled_actions();
    let clock = Clock::start();
    let now = clock.now();

    let mut queue = BinaryHeap::with_capacity(jobs.len());
    for (idx, job) in jobs.iter().enumerate() {
        let due = job.action().schedule().first_after(now, &location);
        info!(
            plugin = %job.plugin(),
            schedule = %job.action().schedule(),
            next = %due,
            "Scheduled action registered"
        );
        queue.push(Reverse((due, idx)));
    }

    let mut firings: JoinSet<Firing> = JoinSet::new();
    loop {
        let Some(&Reverse((due, idx))) = queue.peek() else {
            break;
        };
        let wait = (due - clock.now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(done) = firings.join_next(), if !firings.is_empty() => {
                finish(&registry, &metrics, done);
            }
            _ = tokio::time::sleep(wait) => {
                queue.pop();
                let job = &jobs[idx];
                debug!(plugin = %job.plugin(), index = job.index(), "Firing scheduled action");

                let action = job.action().clone();
                let sender = Arc::clone(&sender);
                firings.spawn(async move {
                    // The job body itself may panic before yielding a future.
                    let outcome = AssertUnwindSafe(async move { action.run(sender).await })
                        .catch_unwind()
                        .await;
                    (idx, outcome.err().map(|p| panic_message(p.as_ref())))
                });

                let next = job.action().schedule().next_after(due, &location);
                queue.push(Reverse((next, idx)));
            }
        }
    }

    while let Some(done) = firings.join_next().await {
        finish(&registry, &metrics, done);
    }
    debug!("Scheduler stopped");
}

fn finish(
    registry: &PluginRegistry,
    metrics: &Metrics,
    done: Result<Firing, tokio::task::JoinError>,
) {
    match done {
        Ok((idx, panic)) => {
            metrics.record_firing(panic.is_some());
            if let Some(message) = panic {
                let job = &registry.scheduled_actions()[idx];
                warn!(
                    plugin = %job.plugin(),
                    index = job.index(),
                    message = %message,
                    "Scheduled action panicked"
                );
            }
        }
        Err(e) => error!(error = %e, "Scheduled action task failed"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveTime, TimeZone, Timelike, Weekday};
    use chrono_tz::America::Los_Angeles;
    use tartan_framework::{Plugin, Schedule, ScheduledAction, TimeUnit};

    use super::*;
    use crate::engine::test_support::RecordingSender;

    fn weekly_digest() -> ScheduledAction {
        ScheduledAction::new(
            Schedule::weekly_on(Weekday::Mon)
                .at(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            "Posts the weekly digest",
            |sender| async move {
                let _ = sender.send_new_message("Happy Monday!", "C_GENERAL").await;
            },
        )
    }

    #[tokio::test]
    async fn test_weekly_action_fires_on_monday_morning() {
        let registry = PluginRegistry::builder()
            .with(Plugin::new("digest").scheduled(weekly_digest()))
            .unwrap()
            .build();
        let job = &registry.scheduled_actions()[0];
        let location = TimeLocation::parse("America/Los_Angeles").unwrap();
        let sender = Arc::new(RecordingSender::default());

        let start = Los_Angeles
            .with_ymd_and_hms(2026, 3, 4, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let mut due = job.action().schedule().first_after(start, &location);
        for _ in 0..100 {
            let local = due.with_timezone(&Los_Angeles);
            assert_eq!(local.weekday(), Weekday::Mon);
            assert_eq!((local.hour(), local.minute()), (10, 0));

            job.action().run(sender.clone()).await;
            due = job.action().schedule().next_after(due, &location);
        }

        let sent = sender.sent();
        assert_eq!(sent.len(), 100);
        assert!(sent.iter().all(|(channel, _)| channel == "C_GENERAL"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_fires_and_survives_panics() {
        let plugin = Plugin::new("ticker")
            .scheduled(ScheduledAction::new(
                Schedule::every(1, TimeUnit::Seconds),
                "ticks",
                |sender| async move {
                    let _ = sender.send_new_message("tick", "C1").await;
                },
            ))
            .scheduled(ScheduledAction::new(
                Schedule::every(1, TimeUnit::Seconds),
                "explodes",
                |_| async move { panic!("scheduled job exploded") },
            ));
        let registry = Arc::new(PluginRegistry::builder().with(plugin).unwrap().build());
        let sender = Arc::new(RecordingSender::default());
        let metrics = Metrics::new(1);
        let shutdown = CancellationToken::new();

        let runner = SchedulerRunner::start(
            registry,
            sender.clone(),
            TimeLocation::Local,
            Arc::clone(&metrics),
            &shutdown,
        );
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        runner.stop().await;

        assert_eq!(sender.sent().len(), 3);
        let stats = metrics.snapshot();
        assert_eq!(stats.scheduled_firings, 6);
        assert_eq!(stats.scheduled_panics, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_survives_job_panicking_before_its_future() {
        let plugin = Plugin::new("ticker")
            .scheduled(ScheduledAction::new(
                Schedule::every(1, TimeUnit::Seconds),
                "ticks",
                |sender| async move {
                    let _ = sender.send_new_message("tick", "C1").await;
                },
            ))
            .scheduled(ScheduledAction::new(
                Schedule::every(1, TimeUnit::Seconds),
                "explodes while building its future",
                |_| -> futures::future::Ready<()> { panic!("job body exploded") },
            ));
        let registry = Arc::new(PluginRegistry::builder().with(plugin).unwrap().build());
        let sender = Arc::new(RecordingSender::default());
        let metrics = Metrics::new(1);

        let runner = SchedulerRunner::start(
            registry,
            sender.clone(),
            TimeLocation::Local,
            Arc::clone(&metrics),
            &CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        runner.stop().await;

        assert_eq!(sender.sent().len(), 3);
        let stats = metrics.snapshot();
        assert_eq!(stats.scheduled_firings, 6);
        assert_eq!(stats.scheduled_panics, 3);
    }

    #[tokio::test]
    async fn test_runner_without_jobs_stops_immediately() {
        let registry = Arc::new(PluginRegistry::builder().build());
        let runner = SchedulerRunner::start(
            registry,
            Arc::new(RecordingSender::default()),
            TimeLocation::Local,
            Metrics::new(1),
            &CancellationToken::new(),
        );
        runner.stop().await;
    }
}
