//! Worker registry - derives partition-worker lifecycles from assignments
//!
//! The registry owns the map of running workers. Revocations stop workers
//! (each performing its final flush) before ownership moves; assignments
//! start workers only for partitions not already owned. No two workers ever
//! own the same partition, and workers for still-owned partitions are never
//! interrupted by a rebalance.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use rdkafka::message::{Message, OwnedMessage};
use tracing::{info, warn};

use crate::metrics_consts::UNROUTED_MESSAGES;
use crate::sink::PointSink;

use super::partition_worker::{PartitionWorker, WorkerConfig};
use super::types::Partition;

pub struct WorkerRegistry {
    workers: DashMap<Partition, PartitionWorker>,
    sink: Arc<dyn PointSink>,
    worker_config: WorkerConfig,
}

impl WorkerRegistry {
    pub fn new(sink: Arc<dyn PointSink>, worker_config: WorkerConfig) -> Self {
        Self {
            workers: DashMap::new(),
            sink,
            worker_config,
        }
    }

    /// Stop the workers for revoked partitions. Each completes its queued
    /// messages and final flush before this returns.
    pub async fn revoke_partitions(&self, revoked: &[Partition]) {
        let removed: Vec<PartitionWorker> = revoked
            .iter()
            .filter_map(|partition| self.workers.remove(partition).map(|(_, worker)| worker))
            .collect();

        if removed.is_empty() {
            return;
        }

        info!("Stopping {} revoked partition workers", removed.len());
        join_all(removed.into_iter().map(PartitionWorker::shutdown)).await;
    }

    /// Start workers for newly assigned partitions. Workers already running
    /// for still-owned partitions are left untouched, so a cooperative
    /// rebalance that only adds partitions never interrupts the others.
    pub fn start_partitions(&self, assigned: &[Partition]) {
        for partition in assigned {
            if self.workers.contains_key(partition) {
                continue;
            }
            info!(
                "Starting partition worker for {}:{}",
                partition.topic(),
                partition.partition_number()
            );
            self.workers.insert(
                partition.clone(),
                PartitionWorker::new(partition.clone(), self.sink.clone(), &self.worker_config),
            );
        }
    }

    /// Replace the owned partition set with `assigned` wholesale: workers
    /// for partitions that left the set are stopped first, then workers for
    /// new partitions are started.
    pub async fn apply_assignment(&self, assigned: &[Partition]) {
        let assigned_set: HashSet<&Partition> = assigned.iter().collect();

        let revoked: Vec<Partition> = self
            .workers
            .iter()
            .filter(|entry| !assigned_set.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        self.revoke_partitions(&revoked).await;

        self.start_partitions(assigned);
    }

    /// Route one message to the worker owning its partition. Messages for
    /// partitions without a worker (revoked while in flight) are dropped.
    pub async fn dispatch(&self, msg: OwnedMessage) {
        let partition = Partition::new(msg.topic().to_string(), msg.partition());

        // Clone the sender so the map guard is released before awaiting.
        let Some(sender) = self.workers.get(&partition).map(|worker| worker.sender()) else {
            metrics::counter!(UNROUTED_MESSAGES).increment(1);
            warn!(
                topic = partition.topic(),
                partition = partition.partition_number(),
                offset = msg.offset(),
                "Dropping message for unassigned partition"
            );
            return;
        };

        if sender.send(msg).await.is_err() {
            warn!(
                topic = partition.topic(),
                partition = partition.partition_number(),
                "Partition worker is gone, dropping message"
            );
        }
    }

    /// Stop every worker, each performing its final flush.
    pub async fn shutdown(&self) {
        let partitions: Vec<Partition> = self
            .workers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        self.revoke_partitions(&partitions).await;
    }

    pub fn owned_partitions(&self) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = self
            .workers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        partitions.sort();
        partitions
    }
}
