//! OTLP ingestion.
//!
//! `convert` normalizes OTLP protobuf messages into store entities; `grpc`
//! exposes the store as the three OTLP collector services.

pub mod convert;
pub mod grpc;

pub use convert::{
    convert_log_record, convert_metric, convert_resource, convert_scope, convert_span, to_time,
    ConvertedMetric, IngestReport, Rejection,
};
pub use grpc::{LogsServiceServer, MetricsServiceServer, OtlpGrpcReceiver, TraceServiceServer};
