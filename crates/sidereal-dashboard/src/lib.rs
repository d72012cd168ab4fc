//! Sidereal Dashboard - bounded in-memory telemetry for the local dashboard.
//!
//! This crate provides the dashboard's telemetry backend:
//! - Receives OTLP over gRPC for traces, metrics, and logs
//! - Normalizes resources into applications and keeps per-application,
//!   FIFO-bounded collections of spans, log records, and metric points
//! - Serves paged, filtered queries and derived views (traces, instruments,
//!   service map) over an HTTP JSON API
//! - Notifies subscribers when new data arrives
//!
//! ## Architecture
//!
//! ```text
//! OTLP gRPC → convert → TelemetryStore (RwLock, bounded logs)
//!                              │
//!                ┌─────────────┼──────────────┐
//!                ▼             ▼              ▼
//!          HTTP Query API   subscribe()   version()
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod ids;
pub mod ingest;
pub mod model;
pub mod query;
pub mod semconv;
pub mod store;

#[cfg(test)]
pub mod test_fixtures;

pub use config::{DashboardConfig, TelemetryLimits};
pub use error::{DashboardError, Result};
pub use ingest::IngestReport;
pub use store::{Signal, StoreChange, TelemetryStore};
