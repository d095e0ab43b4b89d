use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::kafka::consumer::GroupConsumer;
use crate::sink::{InfluxSink, PointSink};

/// The ingestion pipeline: a shared store sink and one consumer-group
/// member per configured slot, wired for graceful shutdown.
pub struct Pipeline {
    config: Config,
    sink: Arc<dyn PointSink>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let sink = Arc::new(
            InfluxSink::new(
                &config.influx_url,
                &config.influx_database,
                &config.influx_username,
                &config.influx_password,
                config.influx_timeout(),
            )
            .with_context(|| format!("Failed to create store client for {}", config.influx_url))?,
        );

        Ok(Self { config, sink })
    }

    /// Run until SIGTERM or ctrl-c. Group membership is fatal-on-failure at
    /// startup: if any member cannot be created, the error propagates and
    /// the process exits.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_txs = Vec::with_capacity(self.config.consumer_members);
        let mut members: Vec<JoinHandle<Result<()>>> =
            Vec::with_capacity(self.config.consumer_members);

        for member in 0..self.config.consumer_members {
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let consumer = GroupConsumer::new(&self.config, self.sink.clone(), shutdown_rx)
                .with_context(|| format!("Failed to create consumer member {member}"))?;

            shutdown_txs.push(shutdown_tx);
            members.push(tokio::spawn(consumer.start_consumption()));
        }

        info!(
            members = self.config.consumer_members,
            topic = self.config.kafka_topic,
            "Ingestion pipeline started"
        );

        wait_for_shutdown_signal().await;
        info!("Shutdown signal received, draining partition workers");

        for shutdown_tx in shutdown_txs {
            // A member that already exited dropped its receiver; nothing to
            // signal then.
            shutdown_tx.send(()).ok();
        }

        for (member, handle) in members.into_iter().enumerate() {
            match timeout(self.config.shutdown_timeout(), handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    error!(member, error = %e, "Consumer member exited with error")
                }
                Ok(Err(e)) => error!(member, error = %e, "Consumer member panicked"),
                Err(_) => warn!(
                    member,
                    "Consumer member did not drain within {:?}",
                    self.config.shutdown_timeout()
                ),
            }
        }

        info!("Ingestion pipeline stopped");
        Ok(())
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
