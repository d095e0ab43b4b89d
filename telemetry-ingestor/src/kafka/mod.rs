// Kafka module - consumer-group membership, rebalance handling, and the
// per-partition batch/flush workers.
pub mod consumer;
pub mod context;
pub mod partition_worker;
pub mod rebalance;
pub mod types;
