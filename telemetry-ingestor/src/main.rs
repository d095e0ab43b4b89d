use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use telemetry_ingestor::{config::Config, serve, service::Pipeline};

fn start_server(config: &Config) -> JoinHandle<()> {
    let router = serve::operational_router();
    let bind = config.bind_address();

    tokio::task::spawn(async move {
        serve::serve(router, &bind)
            .await
            .expect("failed to start serving operational endpoints");
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting telemetry ingestor");

    let config = Config::init_with_defaults()
        .context("Failed to load configuration from environment variables")?;

    info!(
        kafka_hosts = config.kafka_hosts,
        topic = config.kafka_topic,
        group_id = config.kafka_consumer_group,
        influx_url = config.influx_url,
        database = config.influx_database,
        flush_interval_secs = config.flush_interval_secs,
        "Configuration loaded"
    );

    let server_handle = start_server(&config);
    info!("Started operational endpoints on {}", config.bind_address());

    let pipeline = Pipeline::new(config).context("Failed to create ingestion pipeline")?;

    // Blocks until shutdown, then drains all partition workers.
    pipeline.run().await?;

    server_handle.abort();

    Ok(())
}
