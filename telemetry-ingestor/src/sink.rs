//! Store sink - writes accumulated points to the time-series store
//!
//! One HTTP write per flush window. Failures are reported to the caller,
//! which drops the window; there is no retry or buffering here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::batch::WritePoint;
use crate::error::WriteError;

/// Destination for drained batches. Workers only ever see this trait, so
/// tests can swap the store for an in-memory double.
#[async_trait]
pub trait PointSink: Send + Sync {
    async fn write(&self, points: &[WritePoint]) -> Result<(), WriteError>;
}

/// Writes line-protocol batches to an InfluxDB `/write` endpoint.
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: String,
    database: String,
    username: String,
    password: String,
}

impl InfluxSink {
    pub fn new(
        base_url: &str,
        database: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build store HTTP client")?;

        Ok(Self {
            client,
            write_url: format!("{}/write", base_url.trim_end_matches('/')),
            database: database.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[async_trait]
impl PointSink for InfluxSink {
    async fn write(&self, points: &[WritePoint]) -> Result<(), WriteError> {
        let body = encode_line_protocol(points);
        if body.is_empty() {
            // Idle window, nothing to write. The transport is not touched.
            return Ok(());
        }

        let response = self
            .client
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .basic_auth(&self.username, Some(&self.password))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Encode points as InfluxDB line protocol with second precision:
/// `measurement,deviceId=<id> <field>=<value>[,...] <timestamp>`.
/// Points with no fields produce no line.
pub fn encode_line_protocol(points: &[WritePoint]) -> String {
    let mut lines = Vec::with_capacity(points.len());

    for point in points {
        if point.fields.is_empty() {
            continue;
        }

        let fields = point
            .fields
            .iter()
            .map(|(id, value)| format!("{}={}", escape_tag(id), value))
            .collect::<Vec<_>>()
            .join(",");

        lines.push(format!(
            "{},deviceId={} {} {}",
            escape_measurement(&point.measurement),
            escape_tag(&point.device_id),
            fields,
            point.timestamp
        ));
    }

    lines.join("\n")
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(name: &str) -> String {
    name.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
