//! Normalized in-memory telemetry entities.
//!
//! Entities are immutable once built and shared as `Arc`s between the store's
//! collections, its indexes and query results.

mod application;
mod log;
mod metric;
mod scope;
mod span;
mod trace;

pub use application::{Application, Resource, UNKNOWN_SERVICE_NAME};
pub use log::{LogLevel, LogRecord};
pub use metric::{
    AggregationTemporality, DataPoint, HistogramValue, Instrument, InstrumentSummary, Metric,
    MetricKind, MetricPoint, MetricValue,
};
pub use scope::Scope;
pub use span::{Span, SpanEvent, SpanKind, SpanLink, SpanStatus};
pub use trace::Trace;
