//! Metric instruments and their data points.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Application, Scope};
use crate::attributes::Attributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricKind {
    Gauge,
    Sum,
    Histogram,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AggregationTemporality {
    #[default]
    Unspecified,
    Delta,
    Cumulative,
}

impl AggregationTemporality {
    pub const fn from_otlp(value: i32) -> Self {
        match value {
            1 => Self::Delta,
            2 => Self::Cumulative,
            _ => Self::Unspecified,
        }
    }
}

/// Descriptor shared by every data point of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    pub application: Arc<Application>,
    pub scope: Arc<Scope>,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: MetricKind,
    pub temporality: AggregationTemporality,
    pub is_monotonic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramValue {
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
    pub count: u64,
    pub sum: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
    Histogram(HistogramValue),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub start_time: DateTime<Utc>,
    pub time: DateTime<Utc>,
    pub value: MetricValue,
    /// Shared with neighbouring points that carry identical attributes.
    pub attributes: Arc<Attributes>,
}

/// One data point together with the instrument that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub instrument: Arc<Instrument>,
    pub point: Arc<DataPoint>,
}

/// An instrument with all of its retained data points, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub instrument: Arc<Instrument>,
    pub data_points: Vec<Arc<DataPoint>>,
}

/// Catalogue entry for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSummary {
    pub scope: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: MetricKind,
    pub data_point_count: usize,
}
