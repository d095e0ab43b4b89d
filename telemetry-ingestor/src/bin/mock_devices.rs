//! Mock device load generator.
//!
//! Simulates a fleet of devices publishing telemetry to the ingest topic,
//! one payload per device per interval, in the wire format the ingestor
//! consumes. Intended for local testing against a real broker.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use envconfig::Envconfig;
use rand::Rng;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Envconfig, Debug)]
struct MockConfig {
    #[envconfig(default = "localhost:9092")]
    kafka_hosts: String,

    #[envconfig(default = "device-telemetry")]
    kafka_topic: String,

    #[envconfig(default = "50")]
    devices: usize,

    #[envconfig(default = "300")]
    points_per_device: usize,

    #[envconfig(default = "5")]
    send_interval_secs: u64,
}

#[derive(Serialize)]
struct MockReading {
    id: String,
    value: f64,
    quality: f64,
}

#[derive(Serialize)]
struct MockRecord {
    #[serde(rename = "type")]
    kind: String,
    at: i64,
    tag: Vec<String>,
    datastream: Vec<MockReading>,
}

fn mock_payload(device_id: &str, measurement: &str, points: usize) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();

    let datastream = (0..points)
        .map(|i| MockReading {
            id: format!("random{i}"),
            value: rng.gen::<f64>() * 100.0,
            quality: 192.0,
        })
        .collect();

    let at = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let record = MockRecord {
        kind: measurement.to_string(),
        at,
        tag: vec!["quality".to_string()],
        datastream,
    };

    let payload: HashMap<&str, MockRecord> = HashMap::from([(device_id, record)]);
    serde_json::to_vec(&payload).context("Failed to serialize mock payload")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MockConfig::init_from_env()
        .context("Failed to load configuration from environment variables")?;

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("message.timeout.ms", "5000")
        .create()
        .context("Failed to create Kafka producer")?;

    let device_ids: Vec<String> = (0..config.devices)
        .map(|_| Uuid::new_v4().simple().to_string())
        .collect();

    info!(
        devices = config.devices,
        points = config.points_per_device,
        topic = config.kafka_topic,
        interval_secs = config.send_interval_secs,
        "Publishing mock device telemetry"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.send_interval_secs));

    loop {
        ticker.tick().await;

        for device_id in &device_ids {
            let payload =
                mock_payload(device_id, &config.kafka_topic, config.points_per_device)?;
            let record = FutureRecord::to(&config.kafka_topic)
                .key(device_id)
                .payload(&payload);

            if let Err((e, _)) = producer.send(record, Duration::from_secs(5)).await {
                warn!(device_id = %device_id, error = %e, "Failed to publish mock telemetry");
            }
        }

        info!(devices = device_ids.len(), "Published one telemetry round");
    }
}
