use thiserror::Error;

/// Per-message decode failure. Non-fatal: the worker logs it and moves on to
/// the next message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("received empty payload")]
    Empty,
    #[error("malformed telemetry payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Store write failure for one flush window. Non-fatal: the caller logs it
/// and drops the window.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
