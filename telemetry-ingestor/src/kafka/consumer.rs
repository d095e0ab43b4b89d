use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::ClientConfig;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics_consts::RECV_ERRORS;
use crate::sink::PointSink;

use super::context::IngestConsumerContext;
use super::rebalance::WorkerRegistry;

/// One consumer-group member: a stream consumer whose rebalance callbacks
/// start and stop partition workers, plus the loop that routes inbound
/// messages to them.
pub struct GroupConsumer {
    consumer: StreamConsumer<IngestConsumerContext>,
    registry: Arc<WorkerRegistry>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl GroupConsumer {
    /// Join the consumer group. Failure here is fatal: the pipeline cannot
    /// run without group membership.
    pub fn new(
        config: &Config,
        sink: Arc<dyn PointSink>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<Self> {
        let registry = Arc::new(WorkerRegistry::new(sink, config.worker_config()));
        let context = IngestConsumerContext::new(registry.clone());

        let consumer: StreamConsumer<IngestConsumerContext> = consumer_client_config(config)
            .create_with_context(context)
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&config.kafka_topic])
            .with_context(|| format!("Failed to subscribe to topic: {}", config.kafka_topic))?;

        info!(
            topic = config.kafka_topic,
            group_id = config.kafka_consumer_group,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            registry,
            shutdown_rx,
        })
    }

    /// Consume until shutdown is signalled, then drain every worker before
    /// leaving the group.
    pub async fn start_consumption(mut self) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => {
                    info!("Shutdown signal received, stopping consumer loop");
                    break;
                }

                msg_result = self.consumer.recv() => match msg_result {
                    Ok(msg) => {
                        self.registry.dispatch(msg.detach()).await;
                    }
                    Err(e) => {
                        // Transient broker-side conditions; the client
                        // reconnects on its own.
                        metrics::counter!(RECV_ERRORS).increment(1);
                        warn!(error = %e, "Kafka recv error");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }

        // Drain: every worker completes its queued messages and final flush.
        self.registry.shutdown().await;
        self.consumer.unsubscribe();
        info!("Graceful shutdown completed");

        Ok(())
    }
}

fn consumer_client_config(config: &Config) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("group.id", &config.kafka_consumer_group)
        .set("auto.offset.reset", &config.kafka_consumer_offset_reset)
        // Cooperative-sticky rebalancing delivers only the partitions that
        // actually moved, so workers for still-owned partitions keep
        // accumulating across a rebalance.
        .set("partition.assignment.strategy", "cooperative-sticky")
        // Offset management is delegated to the group protocol entirely:
        // periodic auto-commit of stored offsets, at-least-once delivery.
        .set("enable.auto.commit", "true")
        .set("enable.auto.offset.store", "true")
        .set("statistics.interval.ms", "10000");
    client_config
}

#[cfg(test)]
mod tests {
    use super::*;
    use envconfig::Envconfig;

    fn test_config() -> Config {
        Config::init_from_hashmap(&std::collections::HashMap::new()).unwrap()
    }

    #[test]
    fn client_config_carries_group_and_offset_policy() {
        let config = consumer_client_config(&test_config());

        assert_eq!(config.get("group.id"), Some("telemetry-ingestor"));
        assert_eq!(config.get("auto.offset.reset"), Some("latest"));
        assert_eq!(config.get("enable.auto.commit"), Some("true"));
        assert_eq!(
            config.get("partition.assignment.strategy"),
            Some("cooperative-sticky")
        );
    }
}
