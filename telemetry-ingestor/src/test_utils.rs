use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rdkafka::message::OwnedMessage;
use rdkafka::Timestamp;

use crate::batch::WritePoint;
use crate::error::WriteError;
use crate::sink::PointSink;

/// Sink double recording every store write. Mirrors the real sink's
/// contract: empty point sets never reach the transport, so they are not
/// recorded either.
#[derive(Debug, Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<Vec<WritePoint>>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<Vec<WritePoint>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_next_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PointSink for RecordingSink {
    async fn write(&self, points: &[WritePoint]) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(WriteError::Rejected {
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        self.writes.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

/// A well-formed single-device payload with one reading.
pub fn device_payload(device_id: &str, value: f64) -> Vec<u8> {
    format!(
        r#"{{"{device_id}": {{"type":"temp","at":1000,"datastream":[{{"id":"t1","value":{value},"quality":192}}]}}}}"#
    )
    .into_bytes()
}

pub fn owned_message(topic: &str, partition: i32, offset: i64, payload: &[u8]) -> OwnedMessage {
    OwnedMessage::new(
        Some(payload.to_vec()),
        None,
        topic.to_string(),
        Timestamp::NotAvailable,
        partition,
        offset,
        None,
    )
}
