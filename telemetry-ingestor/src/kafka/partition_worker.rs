//! Partition worker - the batch/flush event loop for a single partition
//!
//! Each owned partition gets one worker task fed through a bounded channel.
//! The task selects over message arrival and a periodic flush timer, so
//! decode/append and drain/flush never run concurrently for the same
//! accumulator and no locking is needed. Ordering is preserved within the
//! partition; parallelism comes from running one worker per partition.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::message::{Message, OwnedMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::batch::BatchAccumulator;
use crate::metrics_consts::{
    DECODE_FAILURES, FLUSHES_COMPLETED, MESSAGES_CONSUMED, POINTS_FLUSHED, WRITE_FAILURES,
};
use crate::sink::PointSink;
use crate::telemetry;

use super::types::Partition;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Size of the inbound channel per partition.
    pub channel_buffer_size: usize,
    /// Time between two flushes of the worker's accumulator.
    pub flush_interval: Duration,
    /// Bound on the final flush performed while draining.
    pub drain_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 256,
            flush_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to the event loop task processing one partition's messages.
pub struct PartitionWorker {
    partition: Partition,
    sender: mpsc::Sender<OwnedMessage>,
    handle: Option<JoinHandle<()>>,
}

impl PartitionWorker {
    pub fn new(partition: Partition, sink: Arc<dyn PointSink>, config: &WorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_buffer_size);
        let partition_clone = partition.clone();
        let flush_interval = config.flush_interval;
        let drain_timeout = config.drain_timeout;

        let handle = tokio::spawn(async move {
            Self::run_worker(partition_clone, receiver, sink, flush_interval, drain_timeout).await;
        });

        Self {
            partition,
            sender,
            handle: Some(handle),
        }
    }

    /// Queue a message for this worker. Awaits until the channel has
    /// capacity; errors only if the worker task is gone.
    pub async fn send(
        &self,
        msg: OwnedMessage,
    ) -> Result<(), mpsc::error::SendError<OwnedMessage>> {
        self.sender.send(msg).await
    }

    /// Get a clone of the sender for use outside of registry map guards.
    pub fn sender(&self) -> mpsc::Sender<OwnedMessage> {
        self.sender.clone()
    }

    /// Stop the worker: close the channel, let the task consume everything
    /// already queued, and wait for its final flush to complete.
    pub async fn shutdown(mut self) {
        drop(self.sender);

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(()) => {
                    debug!(
                        "Partition worker for {}:{} shut down gracefully",
                        self.partition.topic(),
                        self.partition.partition_number()
                    );
                }
                Err(e) => {
                    warn!(
                        "Partition worker for {}:{} panicked during shutdown: {}",
                        self.partition.topic(),
                        self.partition.partition_number(),
                        e
                    );
                }
            }
        }
    }

    async fn run_worker(
        partition: Partition,
        mut receiver: mpsc::Receiver<OwnedMessage>,
        sink: Arc<dyn PointSink>,
        flush_interval: Duration,
        drain_timeout: Duration,
    ) {
        info!(
            "Starting partition worker for {}:{}",
            partition.topic(),
            partition.partition_number()
        );

        let mut batch = BatchAccumulator::new();
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so the
        // first window spans a full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                maybe_msg = receiver.recv() => match maybe_msg {
                    Some(msg) => Self::handle_message(&partition, &mut batch, &msg),
                    // Channel closed: partition revoked or pipeline stopping.
                    None => break,
                },

                _ = ticker.tick() => {
                    Self::flush(&partition, &mut batch, sink.as_ref()).await;
                }
            }
        }

        // One final best-effort flush, bounded so a stalled store cannot
        // hold up a rebalance indefinitely.
        let final_flush = Self::flush(&partition, &mut batch, sink.as_ref());
        if timeout(drain_timeout, final_flush).await.is_err() {
            warn!(
                "Final flush for {}:{} timed out after {:?}",
                partition.topic(),
                partition.partition_number(),
                drain_timeout
            );
        }

        info!(
            "Partition worker for {}:{} stopped",
            partition.topic(),
            partition.partition_number()
        );
    }

    fn handle_message(partition: &Partition, batch: &mut BatchAccumulator, msg: &OwnedMessage) {
        metrics::counter!(MESSAGES_CONSUMED).increment(1);

        match telemetry::decode(msg.payload().unwrap_or_default()) {
            Ok(reading_sets) => {
                for set in reading_sets {
                    batch.append(set);
                }
            }
            Err(e) => {
                metrics::counter!(DECODE_FAILURES).increment(1);
                warn!(
                    topic = partition.topic(),
                    partition = partition.partition_number(),
                    offset = msg.offset(),
                    error = %e,
                    "Skipping undecodable message"
                );
            }
        }
    }

    async fn flush(partition: &Partition, batch: &mut BatchAccumulator, sink: &dyn PointSink) {
        let points = batch.drain();
        let count = points.len();

        // The window is dropped on failure either way; the loop continues
        // with the fresh accumulator.
        match sink.write(&points).await {
            Ok(()) => {
                if count > 0 {
                    metrics::counter!(POINTS_FLUSHED).increment(count as u64);
                    metrics::counter!(FLUSHES_COMPLETED).increment(1);
                    debug!(
                        topic = partition.topic(),
                        partition = partition.partition_number(),
                        points = count,
                        "Flushed batch"
                    );
                }
            }
            Err(e) => {
                metrics::counter!(WRITE_FAILURES).increment(1);
                error!(
                    topic = partition.topic(),
                    partition = partition.partition_number(),
                    points = count,
                    error = %e,
                    "Store write failed, dropping window"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{device_payload, owned_message, RecordingSink};

    fn test_partition() -> Partition {
        Partition::new("device-telemetry".to_string(), 0)
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            channel_buffer_size: 16,
            flush_interval: Duration::from_secs(1),
            drain_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flush_drains_exactly_the_points_of_the_window() {
        let sink = Arc::new(RecordingSink::new());
        let worker = PartitionWorker::new(test_partition(), sink.clone(), &test_config());

        // Three messages inside the first one-second window.
        tokio::time::sleep(Duration::from_millis(100)).await;
        worker
            .send(owned_message("device-telemetry", 0, 1, &device_payload("d1", 21.5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        worker
            .send(owned_message("device-telemetry", 0, 2, &device_payload("d2", 22.5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        worker
            .send(owned_message("device-telemetry", 0, 3, &device_payload("d3", 23.5)))
            .await
            .unwrap();

        // Cross the flush boundary; a fourth message lands in the next window.
        tokio::time::sleep(Duration::from_millis(200)).await;
        worker
            .send(owned_message("device-telemetry", 0, 4, &device_payload("d4", 24.5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let writes = sink.writes();
            assert_eq!(writes.len(), 1, "exactly one flush for the first window");
            let device_ids: Vec<&str> =
                writes[0].iter().map(|p| p.device_id.as_str()).collect();
            assert_eq!(device_ids, vec!["d1", "d2", "d3"]);
        }

        // The fourth message belongs to the next window and reaches the
        // store with the final flush.
        worker.shutdown().await;
        let writes = sink.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].len(), 1);
        assert_eq!(writes[1][0].device_id, "d4");
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failure_skips_the_message_and_keeps_the_loop_alive() {
        let sink = Arc::new(RecordingSink::new());
        let worker = PartitionWorker::new(test_partition(), sink.clone(), &test_config());

        worker
            .send(owned_message("device-telemetry", 0, 1, br#"{"d1": "not-an-object"}"#))
            .await
            .unwrap();
        worker
            .send(owned_message("device-telemetry", 0, 2, &device_payload("d2", 1.0)))
            .await
            .unwrap();

        worker.shutdown().await;

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 1);
        assert_eq!(writes[0][0].device_id, "d2");
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_drops_the_window_and_keeps_consuming() {
        let sink = Arc::new(RecordingSink::new());
        let worker = PartitionWorker::new(test_partition(), sink.clone(), &test_config());

        sink.fail_next_writes(true);
        worker
            .send(owned_message("device-telemetry", 0, 1, &device_payload("d1", 1.0)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // The failed window is gone; later windows are unaffected.
        sink.fail_next_writes(false);
        worker
            .send(owned_message("device-telemetry", 0, 2, &device_payload("d2", 2.0)))
            .await
            .unwrap();
        worker.shutdown().await;

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 1);
        assert_eq!(writes[0][0].device_id, "d2");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_queued_messages_before_the_final_flush() {
        let sink = Arc::new(RecordingSink::new());
        let worker = PartitionWorker::new(test_partition(), sink.clone(), &test_config());

        for offset in 0..5 {
            worker
                .send(owned_message(
                    "device-telemetry",
                    0,
                    offset,
                    &device_payload(&format!("d{offset}"), offset as f64),
                ))
                .await
                .unwrap();
        }

        // Shutdown immediately: everything queued must still reach the store.
        worker.shutdown().await;

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_windows_write_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let worker = PartitionWorker::new(test_partition(), sink.clone(), &test_config());

        tokio::time::sleep(Duration::from_secs(3)).await;
        worker.shutdown().await;

        assert!(sink.writes().is_empty());
    }
}
