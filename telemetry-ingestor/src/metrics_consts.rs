pub const MESSAGES_CONSUMED: &str = "telemetry_ingestor_messages_consumed";
pub const DECODE_FAILURES: &str = "telemetry_ingestor_decode_failures";
pub const POINTS_FLUSHED: &str = "telemetry_ingestor_points_flushed";
pub const FLUSHES_COMPLETED: &str = "telemetry_ingestor_flushes_completed";
pub const WRITE_FAILURES: &str = "telemetry_ingestor_store_write_failures";
pub const RECV_ERRORS: &str = "telemetry_ingestor_consumer_recv_errors";
pub const BROKER_ERRORS: &str = "telemetry_ingestor_broker_errors";
pub const CONSUMER_RX_MESSAGES: &str = "telemetry_ingestor_consumer_rx_messages";
pub const CONSUMER_RX_BYTES: &str = "telemetry_ingestor_consumer_rx_bytes";
pub const REBALANCE_ASSIGNMENTS: &str = "telemetry_ingestor_rebalance_assignments";
pub const REBALANCE_REVOCATIONS: &str = "telemetry_ingestor_rebalance_revocations";
pub const UNROUTED_MESSAGES: &str = "telemetry_ingestor_unrouted_messages";
