//! Error types for the dashboard telemetry store.
//!
//! Data-quality problems in ingested telemetry are never errors: they are
//! counted in an [`IngestReport`](crate::ingest::IngestReport). The variants
//! here cover configuration and caller mistakes only.

use std::io;

/// Errors raised by the dashboard store and its servers.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Configuration could not be loaded or extracted.
    #[error("configuration error: {0}")]
    Config(String),

    /// A configured limit is out of range.
    #[error("invalid limit {name}: {value} (must be greater than zero)")]
    InvalidLimit {
        /// Name of the offending option.
        name: &'static str,
        /// The rejected value.
        value: usize,
    },

    /// Caller supplied an argument the store cannot interpret.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// gRPC transport failure.
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;

impl From<figment::Error> for DashboardError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<DashboardError> for tonic::Status {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Config(_)
            | DashboardError::InvalidLimit { .. }
            | DashboardError::InvalidArgument(_) => Self::invalid_argument(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}
