use std::time::Duration;

use anyhow::Result;
use envconfig::Envconfig;

use crate::kafka::partition_worker::WorkerConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    // Kafka configuration
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "device-telemetry")]
    pub kafka_topic: String,

    #[envconfig(default = "telemetry-ingestor")]
    pub kafka_consumer_group: String,

    // "latest" starts at the newest offset unless the group already has a
    // committed offset; "earliest" replays from the oldest retained message.
    #[envconfig(default = "latest")]
    pub kafka_consumer_offset_reset: String,

    // How many consumer-group members this process runs. Partitions are
    // spread over members by the broker's group protocol.
    #[envconfig(default = "1")]
    pub consumer_members: usize,

    // Store configuration
    #[envconfig(default = "http://localhost:8086")]
    pub influx_url: String,

    #[envconfig(default = "telemetry")]
    pub influx_database: String,

    #[envconfig(default = "admin")]
    pub influx_username: String,

    #[envconfig(default = "admin")]
    pub influx_password: String,

    #[envconfig(default = "10")]
    pub influx_timeout_secs: u64,

    // Batching configuration
    #[envconfig(default = "5")]
    pub flush_interval_secs: u64,

    #[envconfig(default = "256")]
    pub partition_channel_size: usize,

    #[envconfig(default = "5")]
    pub drain_timeout_secs: u64,

    #[envconfig(default = "30")]
    pub shutdown_timeout_secs: u64,

    // HTTP server configuration
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.consumer_members == 0 {
            anyhow::bail!("consumer_members must be at least 1");
        }
        if self.flush_interval_secs == 0 {
            anyhow::bail!("flush_interval_secs must be at least 1");
        }
        if !matches!(
            self.kafka_consumer_offset_reset.as_str(),
            "earliest" | "latest"
        ) {
            anyhow::bail!(
                "kafka_consumer_offset_reset must be 'earliest' or 'latest', got '{}'",
                self.kafka_consumer_offset_reset
            );
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn influx_timeout(&self) -> Duration {
        Duration::from_secs(self.influx_timeout_secs)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            channel_buffer_size: self.partition_channel_size,
            flush_interval: self.flush_interval(),
            drain_timeout: self.drain_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> Config {
        Config::init_from_hashmap(&std::collections::HashMap::new()).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = default_config();
        config.validate().unwrap();
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn rejects_zero_members() {
        let mut config = default_config();
        config.consumer_members = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_offset_reset() {
        let mut config = default_config();
        config.kafka_consumer_offset_reset = "newest".to_string();
        assert!(config.validate().is_err());
    }
}
