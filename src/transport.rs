//! Submission and history-fetch boundaries.
//!
//! The capture side only needs a [`WindowSink`]; the scoring side only needs
//! a [`HistorySource`]. Both are object safe so sessions and servers can hold
//! them as `Arc<dyn ...>`.

use crate::core::{TelemetryRecord, WindowAggregate};
use async_trait::async_trait;

/// Errors raised by a transport implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport config error: {0}")]
    Config(String),
    #[error("transport network error: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Receives flushed windows. Called fire-and-forget; errors are only logged.
#[async_trait]
pub trait WindowSink: Send + Sync {
    async fn submit_window(&self, record: &TelemetryRecord) -> Result<(), TransportError>;
}

/// Supplies a subject's previously recorded windows, oldest first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, subject_id: &str)
        -> Result<Vec<WindowAggregate>, TransportError>;
}
