//! Composable test fixtures using rstest.
//!
//! Two layers are provided:
//!
//! ```text
//! limits ── store / small_store          (rstest fixtures)
//! kv ── otlp_span / otlp_log ── *_request (raw OTLP input)
//! span_builder / log_builder              (converted entities)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rstest::*;
//! use crate::test_fixtures::*;
//!
//! #[rstest]
//! fn my_test(store: TelemetryStore) {
//!     store.add_traces(&trace_request(Some("api"), None, vec![otlp_span(&[1], &[1], "X")]));
//!     assert_eq!(store.trace_count(), 1);
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::collector::{
    logs::v1::ExportLogsServiceRequest, metrics::v1::ExportMetricsServiceRequest,
    trace::v1::ExportTraceServiceRequest,
};
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, InstrumentationScope, KeyValue,
};
use opentelemetry_proto::tonic::logs::v1::{
    LogRecord as OtlpLogRecord, ResourceLogs, ScopeLogs,
};
use opentelemetry_proto::tonic::metrics::v1::{
    metric, number_data_point, Gauge, Metric as OtlpMetric, NumberDataPoint, ResourceMetrics,
    ScopeMetrics,
};
use opentelemetry_proto::tonic::resource::v1::Resource as OtlpResource;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span as OtlpSpan};
use rstest::fixture;

use crate::attributes::Attributes;
use crate::config::TelemetryLimits;
use crate::model::{
    Application, LogLevel, LogRecord, Resource, Scope, Span, SpanKind, SpanStatus,
};
use crate::store::TelemetryStore;

/// Scope name used by every OTLP request and entity built here.
pub const TEST_SCOPE: &str = "test-scope";

/// Base timestamp for OTLP fixtures: 2023-11-14T22:13:20Z.
const BASE_NANOS: u64 = 1_700_000_000_000_000_000;

// ----------------------------------------------------------------------------
// Store fixtures
// ----------------------------------------------------------------------------

#[fixture]
pub fn limits() -> TelemetryLimits {
    TelemetryLimits::default()
}

/// An empty store with default limits.
#[fixture]
pub fn store(limits: TelemetryLimits) -> TelemetryStore {
    TelemetryStore::new(limits).expect("default limits are valid")
}

/// A store that keeps two spans, logs and metric points per application.
#[fixture]
pub fn small_store() -> TelemetryStore {
    TelemetryStore::new(TelemetryLimits {
        max_span_count: 2,
        max_log_count: 2,
        metrics_count_limit: 2,
        ..TelemetryLimits::default()
    })
    .expect("small limits are valid")
}

// ----------------------------------------------------------------------------
// OTLP input
// ----------------------------------------------------------------------------

pub fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_owned(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_owned())),
        }),
    }
}

fn otlp_resource(name: Option<&str>, instance: Option<&str>) -> Option<OtlpResource> {
    let mut attributes = Vec::new();
    if let Some(name) = name {
        attributes.push(kv("service.name", name));
    }
    if let Some(instance) = instance {
        attributes.push(kv("service.instance.id", instance));
    }
    Some(OtlpResource {
        attributes,
        ..Default::default()
    })
}

fn otlp_scope() -> Option<InstrumentationScope> {
    Some(InstrumentationScope {
        name: TEST_SCOPE.to_owned(),
        version: "1.0.0".to_owned(),
        ..Default::default()
    })
}

/// A root span lasting one second.
pub fn otlp_span(trace_id: &[u8], span_id: &[u8], name: &str) -> OtlpSpan {
    OtlpSpan {
        trace_id: trace_id.to_vec(),
        span_id: span_id.to_vec(),
        name: name.to_owned(),
        start_time_unix_nano: BASE_NANOS,
        end_time_unix_nano: BASE_NANOS + 1_000_000_000,
        ..Default::default()
    }
}

/// A log record with a string body.
pub fn otlp_log(body: &str, severity_number: i32) -> OtlpLogRecord {
    OtlpLogRecord {
        time_unix_nano: BASE_NANOS,
        observed_time_unix_nano: BASE_NANOS,
        severity_number,
        body: Some(AnyValue {
            value: Some(any_value::Value::StringValue(body.to_owned())),
        }),
        ..Default::default()
    }
}

pub fn trace_request(
    name: Option<&str>,
    instance: Option<&str>,
    spans: Vec<OtlpSpan>,
) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: otlp_resource(name, instance),
            scope_spans: vec![ScopeSpans {
                scope: otlp_scope(),
                spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

pub fn logs_request(
    name: Option<&str>,
    instance: Option<&str>,
    log_records: Vec<OtlpLogRecord>,
) -> ExportLogsServiceRequest {
    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: otlp_resource(name, instance),
            scope_logs: vec![ScopeLogs {
                scope: otlp_scope(),
                log_records,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// One gauge with an integer point per value, one second apart.
pub fn gauge_request(
    name: Option<&str>,
    metric_name: &str,
    values: &[i64],
) -> ExportMetricsServiceRequest {
    let data_points = (0u64..)
        .zip(values)
        .map(|(offset, value)| NumberDataPoint {
            time_unix_nano: BASE_NANOS + offset * 1_000_000_000,
            value: Some(number_data_point::Value::AsInt(*value)),
            ..Default::default()
        })
        .collect();

    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: otlp_resource(name, None),
            scope_metrics: vec![ScopeMetrics {
                scope: otlp_scope(),
                metrics: vec![OtlpMetric {
                    name: metric_name.to_owned(),
                    data: Some(metric::Data::Gauge(Gauge { data_points })),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

// ----------------------------------------------------------------------------
// Converted entities
// ----------------------------------------------------------------------------

pub fn test_application(name: &str) -> Arc<Application> {
    Arc::new(Application::from_resource(Resource {
        service_name: Some(name.to_owned()),
        service_instance_id: None,
        attributes: Attributes::new(),
    }))
}

pub fn test_scope() -> Arc<Scope> {
    Arc::new(Scope::new(TEST_SCOPE))
}

fn millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("fixture timestamps are in range")
}

/// Builder for [`Span`] values that skips OTLP conversion.
pub struct SpanBuilder {
    trace_id: String,
    span_id: String,
    parent_span_id: String,
    application: String,
    name: String,
    kind: SpanKind,
    start_ms: i64,
    end_ms: i64,
    attributes: Vec<(String, String)>,
}

pub fn span_builder(trace_id: &str, span_id: &str) -> SpanBuilder {
    SpanBuilder {
        trace_id: trace_id.to_ascii_lowercase(),
        span_id: span_id.to_ascii_lowercase(),
        parent_span_id: String::new(),
        application: "api".to_owned(),
        name: "span".to_owned(),
        kind: SpanKind::Internal,
        start_ms: 1_000,
        end_ms: 2_000,
        attributes: Vec::new(),
    }
}

impl SpanBuilder {
    pub fn application(mut self, name: &str) -> Self {
        self.application = name.to_owned();
        self
    }

    pub fn parent(mut self, span_id: &str) -> Self {
        self.parent_span_id = span_id.to_ascii_lowercase();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub const fn kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    pub const fn start_ms(mut self, ms: i64) -> Self {
        self.start_ms = ms;
        self
    }

    pub const fn end_ms(mut self, ms: i64) -> Self {
        self.end_ms = ms;
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn build(self) -> Span {
        Span {
            application: test_application(&self.application),
            scope: test_scope(),
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_span_id: self.parent_span_id,
            trace_state: String::new(),
            name: self.name,
            kind: self.kind,
            status: SpanStatus::Unset,
            status_message: None,
            start_time: millis(self.start_ms),
            end_time: millis(self.end_ms),
            attributes: Attributes::from(self.attributes),
            events: Vec::new(),
            links: Vec::new(),
        }
    }
}

/// Builder for [`LogRecord`] values that skips OTLP conversion.
pub struct LogBuilder {
    message: String,
    severity: LogLevel,
    time_ms: i64,
}

pub fn log_builder(message: &str) -> LogBuilder {
    LogBuilder {
        message: message.to_owned(),
        severity: LogLevel::Information,
        time_ms: 1_000,
    }
}

impl LogBuilder {
    pub const fn severity(mut self, severity: LogLevel) -> Self {
        self.severity = severity;
        self
    }

    pub fn build(self) -> LogRecord {
        LogRecord {
            application: test_application("api"),
            scope: test_scope(),
            time: millis(self.time_ms),
            severity: self.severity,
            severity_text: String::new(),
            message: self.message,
            original_format: None,
            attributes: Attributes::new(),
            trace_id: String::new(),
            span_id: String::new(),
            flags: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn store_fixture_is_empty(store: TelemetryStore) {
        assert!(store.get_applications().is_empty());
        assert_eq!(store.version(), 0);
    }

    #[rstest]
    fn small_store_has_tight_limits(small_store: TelemetryStore) {
        assert_eq!(small_store.limits().max_span_count, 2);
        assert_eq!(small_store.limits().max_log_count, 2);
        assert_eq!(small_store.limits().metrics_count_limit, 2);
    }

    #[test]
    fn span_builder_defaults_to_root() {
        let span = span_builder("AB", "01").build();
        assert!(span.is_root());
        assert_eq!(span.trace_id, "ab");
        assert_eq!(span.scope.name, TEST_SCOPE);
    }
}
