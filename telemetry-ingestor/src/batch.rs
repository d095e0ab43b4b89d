use crate::telemetry::DeviceReadingSet;

/// One store-ready data point: a device's readings for one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePoint {
    pub measurement: String,
    pub device_id: String,
    /// Field key/value pairs in reading order.
    pub fields: Vec<(String, f64)>,
    /// Unix seconds.
    pub timestamp: i64,
}

impl From<DeviceReadingSet> for WritePoint {
    fn from(set: DeviceReadingSet) -> Self {
        // Only the measured value reaches the store; quality is dropped.
        let fields = set
            .readings
            .into_iter()
            .map(|reading| (reading.id, reading.value))
            .collect();

        Self {
            measurement: set.measurement,
            device_id: set.device_id,
            fields,
            timestamp: set.timestamp,
        }
    }
}

/// Accumulates write points between two flushes of a single partition worker.
///
/// Append and drain are only ever called from the owning worker's event loop,
/// so no locking is needed: a point appended before `drain` is part of that
/// drain's result, a point appended after belongs to the next window.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    points: Vec<WritePoint>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, set: DeviceReadingSet) {
        self.points.push(WritePoint::from(set));
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Hand back everything accumulated so far, leaving the accumulator empty
    /// in the same step.
    pub fn drain(&mut self) -> Vec<WritePoint> {
        std::mem::take(&mut self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Reading;

    fn reading_set(device_id: &str, value: f64) -> DeviceReadingSet {
        DeviceReadingSet {
            device_id: device_id.to_string(),
            measurement: "temp".to_string(),
            timestamp: 1000,
            tags: vec![],
            readings: vec![Reading {
                id: "t1".to_string(),
                value,
                quality: 192.0,
            }],
        }
    }

    #[test]
    fn converts_reading_set_into_write_point() {
        let point = WritePoint::from(reading_set("d1", 21.5));

        assert_eq!(point.measurement, "temp");
        assert_eq!(point.device_id, "d1");
        assert_eq!(point.fields, vec![("t1".to_string(), 21.5)]);
        assert_eq!(point.timestamp, 1000);
    }

    #[test]
    fn drain_returns_points_in_append_order_and_resets() {
        let mut batch = BatchAccumulator::new();
        for i in 0..5 {
            batch.append(reading_set(&format!("d{i}"), i as f64));
        }

        let drained = batch.drain();
        assert_eq!(drained.len(), 5);
        let device_ids: Vec<&str> = drained.iter().map(|p| p.device_id.as_str()).collect();
        assert_eq!(device_ids, vec!["d0", "d1", "d2", "d3", "d4"]);

        assert!(batch.is_empty());
        assert!(batch.drain().is_empty());
    }

    #[test]
    fn points_across_a_drain_boundary_are_neither_lost_nor_duplicated() {
        let mut batch = BatchAccumulator::new();

        batch.append(reading_set("d0", 0.0));
        batch.append(reading_set("d1", 1.0));
        let first = batch.drain();

        batch.append(reading_set("d2", 2.0));
        batch.append(reading_set("d3", 3.0));
        let second = batch.drain();

        let first_ids: Vec<&str> = first.iter().map(|p| p.device_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|p| p.device_id.as_str()).collect();
        assert_eq!(first_ids, vec!["d0", "d1"]);
        assert_eq!(second_ids, vec!["d2", "d3"]);
    }
}
