pub mod batch;
pub mod config;
pub mod error;
pub mod kafka;
pub mod metrics_consts;
pub mod serve;
pub mod service;
pub mod sink;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;
