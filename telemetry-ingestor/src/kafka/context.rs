use std::sync::Arc;

use rdkafka::consumer::{BaseConsumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaError;
use rdkafka::ClientContext;
use tokio::runtime::Handle;
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::metrics_consts::{
    BROKER_ERRORS, CONSUMER_RX_BYTES, CONSUMER_RX_MESSAGES, REBALANCE_ASSIGNMENTS,
    REBALANCE_REVOCATIONS,
};

use super::rebalance::WorkerRegistry;
use super::types::partitions_of;

/// Consumer context wiring broker callbacks to the worker registry.
///
/// Rebalance callbacks run on the consumer's poll path; worker teardown and
/// startup are completed before each callback returns so that ownership of a
/// partition never overlaps. Teardown blocks on the revoked workers' final
/// flush, which requires the multi-threaded runtime (`block_in_place`).
pub struct IngestConsumerContext {
    registry: Arc<WorkerRegistry>,
    rt_handle: Handle,
}

impl IngestConsumerContext {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self {
            registry,
            rt_handle: Handle::current(),
        }
    }
}

impl ClientContext for IngestConsumerContext {
    /// The broker client's error channel must always be drained; every item
    /// is logged and counted, with no backpressure.
    fn error(&self, error: KafkaError, reason: &str) {
        metrics::counter!(BROKER_ERRORS).increment(1);
        warn!(error = %error, reason, "Broker error");
    }

    /// Statistics arrive on the same notification path; record the consumer
    /// totals and move on.
    fn stats(&self, statistics: rdkafka::Statistics) {
        metrics::gauge!(CONSUMER_RX_MESSAGES).set(statistics.rxmsgs as f64);
        metrics::gauge!(CONSUMER_RX_BYTES).set(statistics.rx_bytes as f64);
        debug!(client = %statistics.name, "Broker statistics received");
    }
}

impl ConsumerContext for IngestConsumerContext {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Revoke(partitions) => {
                // Cooperative-sticky triggers rebalances for every group
                // membership change, even when no partitions move here.
                if partitions.count() == 0 {
                    debug!("Skipping empty revoke rebalance (cooperative-sticky no-op)");
                    return;
                }

                info!("Revoking {} partitions", partitions.count());
                metrics::counter!(REBALANCE_REVOCATIONS).increment(1);

                let revoked = partitions_of(partitions);
                let registry = self.registry.clone();
                // Block until the revoked workers have flushed and stopped:
                // no message for these partitions may be processed after this
                // callback returns.
                task::block_in_place(|| {
                    self.rt_handle
                        .block_on(async move { registry.revoke_partitions(&revoked).await })
                });
            }
            Rebalance::Assign(partitions) => {
                debug!(
                    "Pre-rebalance assign event for {} partitions",
                    partitions.count()
                );
            }
            Rebalance::Error(e) => {
                error!("Rebalance error: {}", e);
            }
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                if partitions.count() == 0 {
                    debug!("Skipping empty assign rebalance (cooperative-sticky no-op)");
                    return;
                }

                info!("Assigned {} partitions", partitions.count());
                metrics::counter!(REBALANCE_ASSIGNMENTS).increment(1);

                // Cooperative-sticky assigns are incremental: start workers
                // for the new partitions only, before the consumer stream
                // resumes, so no message arrives without an owner. Workers
                // for still-owned partitions are untouched.
                let assigned = partitions_of(partitions);
                self.registry.start_partitions(&assigned);
            }
            Rebalance::Revoke(_) => {
                debug!("Post-rebalance revoke complete");
            }
            Rebalance::Error(e) => {
                error!("Post-rebalance error: {}", e);
            }
        }
    }

    fn commit_callback(
        &self,
        result: rdkafka::error::KafkaResult<()>,
        offsets: &rdkafka::TopicPartitionList,
    ) {
        match result {
            Ok(_) => {
                debug!("Committed offsets for {} partitions", offsets.count());
            }
            Err(e) => {
                warn!("Failed to commit offsets: {}", e);
            }
        }
    }
}
