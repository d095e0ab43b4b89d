use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::DecodeError;

/// A single datastream reading as emitted by the device gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    pub id: String,
    pub value: f64,
    /// Decoded for completeness; the store schema does not carry it.
    pub quality: f64,
}

/// Per-device record on the wire. The payload maps device id to one of
/// these. The gateway also sends envelope fields (`msgtype`, `debugmode`,
/// `path`) which are ignored here.
#[derive(Debug, Clone, Deserialize)]
struct DeviceRecord {
    #[serde(rename = "type")]
    kind: String,
    at: i64,
    #[serde(default)]
    tag: Vec<String>,
    datastream: Vec<Reading>,
}

/// One device's readings decoded from a single inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReadingSet {
    pub device_id: String,
    pub measurement: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub tags: Vec<String>,
    pub readings: Vec<Reading>,
}

/// Decode one inbound payload into per-device reading sets.
///
/// Decoding is all-or-nothing: any malformed record rejects the whole
/// message. Duplicate device ids within one payload resolve last-write-wins,
/// matching JSON object semantics. Output is ordered by device id.
pub fn decode(payload: &[u8]) -> Result<Vec<DeviceReadingSet>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    let records: BTreeMap<String, DeviceRecord> = serde_json::from_slice(payload)?;

    Ok(records
        .into_iter()
        .map(|(device_id, record)| DeviceReadingSet {
            device_id,
            measurement: record.kind,
            timestamp: record.at,
            tags: record.tag,
            readings: record.datastream,
        })
        .collect())
}
