//! Partition router.
//!
//! Every message event is routed by the identity of the message it is about
//! (its *origin*), so a message, its edits and its deletion always land on the
//! same worker lane and are processed in arrival order.
//!
//! ```text
//!                 crc32(channel ++ ts) & (N-1)
//! MessageEvent ──────────────────────────────▶ lane 0 ─▶ worker 0
//!                                          ├─▶ lane 1 ─▶ worker 1
//!                                          └─▶ lane N-1 ─▶ worker N-1
//! ```

use std::sync::Arc;
use std::time::Instant;

use tartan_core::{MessageEvent, MessageId};
use thiserror::Error;
use tokio::sync::mpsc;

use super::instrumentation::Metrics;

/// Largest accepted partition count.
pub const MAX_PARTITIONS: usize = 1 << 15;

/// Errors building or using a [`PartitionRouter`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The partition count is zero, not a power of two, or too large.
    #[error("partition count must be a power of two between 1 and {MAX_PARTITIONS}, got {0}")]
    InvalidPartitionCount(usize),

    /// The per-partition buffer must hold at least one event.
    #[error("partition buffer size must be at least 1, got {0}")]
    InvalidBufferSize(usize),

    /// The worker for this partition is gone.
    #[error("partition {0} is closed")]
    Closed(usize),
}

/// Partition index of `id` among `count` partitions.
///
/// `count` must be a power of two.
pub fn partition_for(id: &MessageId, count: usize) -> usize {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(id.channel_id.as_bytes());
    hasher.update(id.timestamp.as_bytes());
    hasher.finalize() as usize & (count - 1)
}

/// Owns the sending half of every partition queue.
#[derive(Debug)]
pub struct PartitionRouter {
    lanes: Vec<mpsc::Sender<MessageEvent>>,
    metrics: Arc<Metrics>,
}

impl PartitionRouter {
    /// Creates `count` bounded lanes, returning the receivers for the workers.
    pub fn new(
        count: usize,
        buffer: usize,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, Vec<mpsc::Receiver<MessageEvent>>), RouterError> {
        if !count.is_power_of_two() || count > MAX_PARTITIONS {
            return Err(RouterError::InvalidPartitionCount(count));
        }
        if buffer == 0 {
            return Err(RouterError::InvalidBufferSize(buffer));
        }

        let (lanes, receivers) = (0..count).map(|_| mpsc::channel(buffer)).unzip();
        Ok((Self { lanes, metrics }, receivers))
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> usize {
        self.lanes.len()
    }

    /// Partition that owns `event`'s origin.
    pub fn partition_of(&self, event: &MessageEvent) -> usize {
        partition_for(&event.origin_id(), self.lanes.len())
    }

    /// Enqueues `event` on its partition, waiting while the lane is full.
    ///
    /// Returns the partition index.
    pub async fn dispatch(&self, event: MessageEvent) -> Result<usize, RouterError> {
        let partition = self.partition_of(&event);
        let started = Instant::now();
        self.lanes[partition]
            .send(event)
            .await
            .map_err(|_| RouterError::Closed(partition))?;
        self.metrics.record_dispatch(partition, started.elapsed());
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_partition_is_stable() {
        let id = MessageId::new("general", "11298321983.23");
        let first = partition_for(&id, 4);
        assert!(first < 4);
        for _ in 0..100 {
            assert_eq!(partition_for(&id, 4), first);
        }
    }

    #[test]
    fn test_partition_stable_for_every_power_of_two() {
        let ids = [
            MessageId::new("general", "11298321983.23"),
            MessageId::new("C024BE91L", "1355517523.000005"),
            MessageId::new("D0000", "1.0"),
            MessageId::new("", ""),
        ];
        for shift in 0..=15 {
            let n = 1usize << shift;
            for id in &ids {
                let p = partition_for(id, n);
                assert!(p < n);
                assert_eq!(partition_for(id, n), p);
            }
        }
    }

    #[test]
    fn test_partition_is_crc32_of_channel_and_timestamp() {
        let id = MessageId::new("general", "11298321983.23");
        let expected = crc32fast::hash(b"general11298321983.23") as usize & 15;
        assert_eq!(partition_for(&id, 16), expected);
    }

    #[test]
    fn test_partition_distribution_is_uniform() {
        const SAMPLES: usize = 400_000;
        let mut rng = rand::rng();
        let ids: Vec<MessageId> = (0..SAMPLES)
            .map(|i| {
                let channel = format!("C{:08X}", rng.random::<u32>());
                let ts = format!("{}.{:06}", 1_500_000_000 + i, rng.random_range(0..1_000_000));
                MessageId::new(channel, ts)
            })
            .collect();

        for n in [2usize, 4, 8, 16] {
            let mut hits = vec![0usize; n];
            for id in &ids {
                hits[partition_for(id, n)] += 1;
            }
            let expected = SAMPLES as f64 / n as f64;
            for (partition, &count) in hits.iter().enumerate() {
                let deviation = (count as f64 - expected).abs() / expected;
                assert!(
                    deviation < 0.03,
                    "partition {partition} of {n} got {count}, expected ~{expected}"
                );
            }
        }
    }

    #[test]
    fn test_invalid_partition_counts_are_rejected() {
        for n in [0usize, 3, 5, 6, 7, 12, 100, 1 << 16] {
            let err = assert_err!(PartitionRouter::new(n, 8, Metrics::new(1)));
            assert_eq!(err, RouterError::InvalidPartitionCount(n));
            assert!(err.to_string().contains(&n.to_string()));
        }
        let err = assert_err!(PartitionRouter::new(4, 0, Metrics::new(4)));
        assert_eq!(err, RouterError::InvalidBufferSize(0));
    }

    #[tokio::test]
    async fn test_edit_and_delete_follow_their_origin() {
        let (router, mut receivers) = assert_ok!(PartitionRouter::new(8, 4, Metrics::new(8)));
        assert_eq!(router.partition_count(), 8);

        let new = MessageEvent::new("C1", "100.0", "U1", "hi");
        let edit = MessageEvent::edit("C1", "150.0", "100.0", "U1", "hello");
        let delete = MessageEvent::delete("C1", "160.0", "100.0");

        let p = assert_ok!(router.dispatch(new).await);
        assert_eq!(assert_ok!(router.dispatch(edit).await), p);
        assert_eq!(assert_ok!(router.dispatch(delete).await), p);

        let rx = &mut receivers[p];
        for expected in ["100.0", "150.0", "160.0"] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.timestamp, expected);
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_closed_lane_fails() {
        let (router, receivers) = assert_ok!(PartitionRouter::new(1, 1, Metrics::new(1)));
        drop(receivers);
        let err = assert_err!(router.dispatch(MessageEvent::new("C1", "1.0", "U", "x")).await);
        assert_eq!(err, RouterError::Closed(0));
    }
}
