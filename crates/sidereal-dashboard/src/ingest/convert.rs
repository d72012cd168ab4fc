//! OTLP proto to entity model conversion.
//!
//! Every function here is pure: it copies wire data into normalized entities
//! without touching the store. Entities that cannot be represented are
//! reported as a [`Rejection`] so the caller can count them towards the OTLP
//! partial success response.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::{
    common::v1::{InstrumentationScope, KeyValue},
    logs::v1::LogRecord as OtlpLogRecord,
    metrics::v1::{
        metric, number_data_point, HistogramDataPoint, Metric as OtlpMetric, NumberDataPoint,
    },
    resource::v1::Resource as OtlpResource,
    trace::v1::{span, Span as OtlpSpan},
};

use crate::attributes::{
    encode_attributes, encode_attributes_filtered, AttributeBuffer, AttributeLimits,
    AttributeValue, Attributes,
};
use crate::ids::{to_hex, truncate_str};
use crate::model::{
    AggregationTemporality, Application, DataPoint, HistogramValue, Instrument, LogLevel,
    LogRecord, MetricKind, MetricValue, Resource, Scope, Span, SpanEvent, SpanKind, SpanLink,
    SpanStatus,
};
use crate::semconv;

/// Why a single entity was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("span has an empty trace id")]
    EmptyTraceId,

    #[error("span has an empty span id")]
    EmptySpanId,

    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(u64),

    #[error("data point of metric {0} has no value")]
    MissingValue(String),

    #[error("metric {0} has no data")]
    MissingData(String),

    #[error("metric {name} has unsupported type {kind}")]
    UnsupportedMetric { name: String, kind: &'static str },

    #[error("metric {name} is registered as {registered:?}, got {received:?}")]
    KindMismatch {
        name: String,
        registered: MetricKind,
        received: MetricKind,
    },
}

/// Outcome of one ingestion call.
///
/// Tracks accepted and rejected entities so the transport layer can build an
/// OTLP `partial_success` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entities stored.
    pub accepted: usize,
    /// Entities skipped.
    pub rejected: usize,
    /// Reason for the first rejection, if any.
    pub error_message: Option<String>,
}

impl IngestReport {
    pub const fn is_partial(&self) -> bool {
        self.rejected > 0 || self.error_message.is_some()
    }

    pub(crate) fn reject(&mut self, rejection: &Rejection) {
        tracing::debug!(reason = %rejection, "Rejected telemetry entity");
        self.rejected += 1;
        if self.error_message.is_none() {
            self.error_message = Some(rejection.to_string());
        }
    }

    pub(crate) fn reject_many(&mut self, count: usize, rejection: &Rejection) {
        for _ in 0..count {
            self.reject(rejection);
        }
    }
}

/// Convert OTLP nanoseconds since the epoch into a timestamp.
pub fn to_time(nanos: u64) -> Result<DateTime<Utc>, Rejection> {
    i64::try_from(nanos)
        .map(DateTime::from_timestamp_nanos)
        .map_err(|_| Rejection::TimestampOutOfRange(nanos))
}

/// Read the resource identity and copy its attributes.
///
/// Identity keys are read from the raw attributes so that the count limit can
/// never hide them.
pub fn convert_resource(resource: Option<&OtlpResource>, limits: AttributeLimits) -> Resource {
    let raw = resource.map_or(&[][..], |r| r.attributes.as_slice());

    Resource {
        service_name: identity_value(raw, semconv::SERVICE_NAME),
        service_instance_id: identity_value(raw, semconv::SERVICE_INSTANCE_ID),
        attributes: encode_attributes(raw, limits),
    }
}

fn identity_value(raw: &[KeyValue], key: &str) -> Option<String> {
    raw.iter()
        .find(|kv| kv.key == key)
        .map(|kv| AttributeValue::from_any(kv.value.as_ref()).to_display_string())
        .filter(|value| !value.is_empty())
}

pub fn convert_scope(scope: Option<&InstrumentationScope>, limits: AttributeLimits) -> Scope {
    scope.map_or_else(Scope::default, |scope| Scope {
        name: scope.name.clone(),
        version: scope.version.clone(),
        attributes: encode_attributes(&scope.attributes, limits),
    })
}

pub fn convert_span(
    span: &OtlpSpan,
    application: &Arc<Application>,
    scope: &Arc<Scope>,
    limits: AttributeLimits,
) -> Result<Span, Rejection> {
    if span.trace_id.is_empty() {
        return Err(Rejection::EmptyTraceId);
    }
    if span.span_id.is_empty() {
        return Err(Rejection::EmptySpanId);
    }

    let start_time = to_time(span.start_time_unix_nano)?;
    let end_time = to_time(span.end_time_unix_nano)?;

    let events = span
        .events
        .iter()
        .map(|event| convert_event(event, limits))
        .collect::<Result<Vec<_>, _>>()?;

    let links = span
        .links
        .iter()
        .map(|link| SpanLink {
            trace_id: to_hex(&link.trace_id),
            span_id: to_hex(&link.span_id),
            trace_state: link.trace_state.clone(),
            attributes: encode_attributes(&link.attributes, limits),
        })
        .collect();

    let (status, status_message) = span.status.as_ref().map_or((SpanStatus::Unset, None), |s| {
        let message = (!s.message.is_empty()).then(|| s.message.clone());
        (SpanStatus::from_otlp(s.code), message)
    });

    Ok(Span {
        application: Arc::clone(application),
        scope: Arc::clone(scope),
        trace_id: to_hex(&span.trace_id),
        span_id: to_hex(&span.span_id),
        parent_span_id: to_hex(&span.parent_span_id),
        trace_state: span.trace_state.clone(),
        name: span.name.clone(),
        kind: SpanKind::from_otlp(span.kind),
        status,
        status_message,
        start_time,
        end_time,
        attributes: encode_attributes(&span.attributes, limits),
        events,
        links,
    })
}

fn convert_event(event: &span::Event, limits: AttributeLimits) -> Result<SpanEvent, Rejection> {
    Ok(SpanEvent {
        name: event.name.clone(),
        time: to_time(event.time_unix_nano)?,
        attributes: encode_attributes(&event.attributes, limits),
    })
}

pub fn convert_log_record(
    record: &OtlpLogRecord,
    application: &Arc<Application>,
    scope: &Arc<Scope>,
    limits: AttributeLimits,
) -> Result<LogRecord, Rejection> {
    // Some SDKs only set the observed time.
    let nanos = if record.time_unix_nano == 0 {
        record.observed_time_unix_nano
    } else {
        record.time_unix_nano
    };

    let original_format = record
        .attributes
        .iter()
        .find(|kv| kv.key == semconv::LOG_ORIGINAL_FORMAT)
        .map(|kv| AttributeValue::from_any(kv.value.as_ref()).to_display_string());

    let attributes = encode_attributes_filtered(&record.attributes, limits, |kv| {
        kv.key != semconv::LOG_ORIGINAL_FORMAT
    });

    let message = AttributeValue::from_any(record.body.as_ref()).to_display_string();

    Ok(LogRecord {
        application: Arc::clone(application),
        scope: Arc::clone(scope),
        time: to_time(nanos)?,
        severity: LogLevel::from_severity_number(record.severity_number),
        severity_text: record.severity_text.clone(),
        message: truncate_str(&message, limits.length).to_owned(),
        original_format,
        attributes,
        trace_id: to_hex(&record.trace_id),
        span_id: to_hex(&record.span_id),
        flags: record.flags,
    })
}

/// A metric converted into its instrument and the data points that survived.
#[derive(Debug)]
pub struct ConvertedMetric {
    pub instrument: Arc<Instrument>,
    pub points: Vec<Arc<DataPoint>>,
}

/// Convert one metric, recording rejected data points in `report`.
///
/// `buffer` is scratch space reused across calls; consecutive points with
/// identical attributes share one allocation.
pub fn convert_metric(
    metric: &OtlpMetric,
    application: &Arc<Application>,
    scope: &Arc<Scope>,
    limits: AttributeLimits,
    buffer: &mut AttributeBuffer,
    report: &mut IngestReport,
) -> Option<ConvertedMetric> {
    let Some(data) = &metric.data else {
        report.reject(&Rejection::MissingData(metric.name.clone()));
        return None;
    };

    let (kind, temporality, is_monotonic) = match data {
        metric::Data::Gauge(_) => (MetricKind::Gauge, AggregationTemporality::Unspecified, false),
        metric::Data::Sum(sum) => (
            MetricKind::Sum,
            AggregationTemporality::from_otlp(sum.aggregation_temporality),
            sum.is_monotonic,
        ),
        metric::Data::Histogram(histogram) => (
            MetricKind::Histogram,
            AggregationTemporality::from_otlp(histogram.aggregation_temporality),
            false,
        ),
        metric::Data::ExponentialHistogram(histogram) => {
            report.reject_many(
                histogram.data_points.len().max(1),
                &unsupported(metric, "exponential histogram"),
            );
            return None;
        }
        metric::Data::Summary(summary) => {
            report.reject_many(summary.data_points.len().max(1), &unsupported(metric, "summary"));
            return None;
        }
    };

    let instrument = Arc::new(Instrument {
        application: Arc::clone(application),
        scope: Arc::clone(scope),
        name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        kind,
        temporality,
        is_monotonic,
    });

    let mut points = Vec::new();
    let mut shared = SharedAttributes::default();
    let mut push = |result: Result<DataPoint, Rejection>, report: &mut IngestReport| match result {
        Ok(point) => points.push(Arc::new(point)),
        Err(rejection) => report.reject(&rejection),
    };

    match data {
        metric::Data::Gauge(gauge) => {
            for point in &gauge.data_points {
                let attributes = shared.encode(&point.attributes, limits, buffer);
                push(number_point(metric, point, attributes), report);
            }
        }
        metric::Data::Sum(sum) => {
            for point in &sum.data_points {
                let attributes = shared.encode(&point.attributes, limits, buffer);
                push(number_point(metric, point, attributes), report);
            }
        }
        metric::Data::Histogram(histogram) => {
            for point in &histogram.data_points {
                let attributes = shared.encode(&point.attributes, limits, buffer);
                push(histogram_point(point, attributes), report);
            }
        }
        metric::Data::ExponentialHistogram(_) | metric::Data::Summary(_) => {}
    }

    Some(ConvertedMetric { instrument, points })
}

fn unsupported(metric: &OtlpMetric, kind: &'static str) -> Rejection {
    Rejection::UnsupportedMetric {
        name: metric.name.clone(),
        kind,
    }
}

fn number_point(
    metric: &OtlpMetric,
    point: &NumberDataPoint,
    attributes: Arc<Attributes>,
) -> Result<DataPoint, Rejection> {
    let value = match point.value {
        Some(number_data_point::Value::AsInt(value)) => MetricValue::Int(value),
        Some(number_data_point::Value::AsDouble(value)) => MetricValue::Double(value),
        None => return Err(Rejection::MissingValue(metric.name.clone())),
    };

    Ok(DataPoint {
        start_time: to_time(point.start_time_unix_nano)?,
        time: to_time(point.time_unix_nano)?,
        value,
        attributes,
    })
}

fn histogram_point(
    point: &HistogramDataPoint,
    attributes: Arc<Attributes>,
) -> Result<DataPoint, Rejection> {
    Ok(DataPoint {
        start_time: to_time(point.start_time_unix_nano)?,
        time: to_time(point.time_unix_nano)?,
        value: MetricValue::Histogram(HistogramValue {
            bucket_counts: point.bucket_counts.clone(),
            explicit_bounds: point.explicit_bounds.clone(),
            count: point.count,
            sum: point.sum,
            min: point.min,
            max: point.max,
        }),
        attributes,
    })
}

/// Hands out the previous point's attributes when they are unchanged.
#[derive(Default)]
struct SharedAttributes {
    last: Option<Arc<Attributes>>,
}

impl SharedAttributes {
    fn encode(
        &mut self,
        attributes: &[KeyValue],
        limits: AttributeLimits,
        buffer: &mut AttributeBuffer,
    ) -> Arc<Attributes> {
        buffer.encode(attributes, limits);
        match &self.last {
            Some(last) if buffer.matches(last) => Arc::clone(last),
            _ => {
                let fresh = Arc::new(buffer.to_attributes());
                self.last = Some(Arc::clone(&fresh));
                fresh
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{kv, otlp_log, otlp_span, test_application, test_scope};
    use opentelemetry_proto::tonic::common::v1::{any_value::Value as AnyValueKind, AnyValue};
    use opentelemetry_proto::tonic::metrics::v1::{Gauge, Summary, SummaryDataPoint};
    use opentelemetry_proto::tonic::trace::v1::Status;

    fn number(value: i64, attributes: Vec<KeyValue>) -> NumberDataPoint {
        NumberDataPoint {
            attributes,
            time_unix_nano: 1_000,
            value: Some(number_data_point::Value::AsInt(value)),
            ..Default::default()
        }
    }

    fn gauge(name: &str, data_points: Vec<NumberDataPoint>) -> OtlpMetric {
        OtlpMetric {
            name: name.to_owned(),
            data: Some(metric::Data::Gauge(Gauge { data_points })),
            ..Default::default()
        }
    }

    #[test]
    fn resource_identity_survives_count_limit() {
        let resource = OtlpResource {
            attributes: vec![
                kv("host.name", "box"),
                kv("service.name", "api"),
                kv("service.instance.id", "i-1"),
            ],
            ..Default::default()
        };
        let limits = AttributeLimits {
            count: 1,
            length: usize::MAX,
        };

        let converted = convert_resource(Some(&resource), limits);
        assert_eq!(converted.service_name.as_deref(), Some("api"));
        assert_eq!(converted.service_id(), "i-1");
        assert_eq!(converted.attributes.len(), 1);
    }

    #[test]
    fn missing_resource_is_unknown_service() {
        let converted = convert_resource(None, AttributeLimits::UNBOUNDED);
        assert_eq!(converted.service_id(), crate::model::UNKNOWN_SERVICE_NAME);
    }

    #[test]
    fn span_ids_are_hex() {
        let mut span = otlp_span(&[0x01, 0x02], &[0x0A], "X");
        span.parent_span_id = vec![0xFF];
        span.kind = 3;
        span.status = Some(Status {
            message: "boom".to_owned(),
            code: 2,
        });

        let converted = convert_span(
            &span,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
        )
        .unwrap();

        assert_eq!(converted.trace_id, "0102");
        assert_eq!(converted.span_id, "0a");
        assert_eq!(converted.parent_span_id, "ff");
        assert_eq!(converted.kind, SpanKind::Client);
        assert_eq!(converted.status, SpanStatus::Error);
        assert_eq!(converted.status_message.as_deref(), Some("boom"));
    }

    #[test]
    fn span_without_trace_id_is_rejected() {
        let span = otlp_span(&[], &[0x01], "X");
        let result = convert_span(
            &span,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
        );
        assert_eq!(result.unwrap_err(), Rejection::EmptyTraceId);
    }

    #[test]
    fn span_with_overflowing_time_is_rejected() {
        let mut span = otlp_span(&[0x01], &[0x01], "X");
        span.end_time_unix_nano = u64::MAX;
        let result = convert_span(
            &span,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
        );
        assert_eq!(result.unwrap_err(), Rejection::TimestampOutOfRange(u64::MAX));
    }

    #[test]
    fn log_original_format_is_lifted_out_of_attributes() {
        let mut record = otlp_log("Hello world", 9);
        record.attributes = vec![
            kv("{OriginalFormat}", "Hello {Name}"),
            kv("Name", "world"),
        ];

        let converted = convert_log_record(
            &record,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
        )
        .unwrap();

        assert_eq!(converted.original_format.as_deref(), Some("Hello {Name}"));
        assert!(!converted.attributes.contains_key("{OriginalFormat}"));
        assert_eq!(converted.attributes.get("Name"), Some("world"));
        assert_eq!(converted.severity, LogLevel::Information);
        assert_eq!(converted.message, "Hello world");
        assert_eq!(converted.category(), "test-scope");
    }

    #[test]
    fn log_falls_back_to_observed_time() {
        let mut record = otlp_log("late", 13);
        record.time_unix_nano = 0;
        record.observed_time_unix_nano = 5_000_000_000;

        let converted = convert_log_record(
            &record,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
        )
        .unwrap();
        assert_eq!(converted.time.timestamp(), 5);
    }

    #[test]
    fn log_body_kinds_display() {
        let mut record = otlp_log("", 9);
        record.body = Some(AnyValue {
            value: Some(AnyValueKind::IntValue(7)),
        });
        let converted = convert_log_record(
            &record,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
        )
        .unwrap();
        assert_eq!(converted.message, "7");
    }

    #[test]
    fn gauge_points_share_identical_attributes() {
        let metric = gauge(
            "queue.depth",
            vec![
                number(1, vec![kv("queue", "a")]),
                number(2, vec![kv("queue", "a")]),
                number(3, vec![kv("queue", "b")]),
            ],
        );
        let mut buffer = AttributeBuffer::new();
        let mut report = IngestReport::default();

        let converted = convert_metric(
            &metric,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
            &mut buffer,
            &mut report,
        )
        .unwrap();

        assert_eq!(converted.points.len(), 3);
        assert!(Arc::ptr_eq(
            &converted.points[0].attributes,
            &converted.points[1].attributes
        ));
        assert!(!Arc::ptr_eq(
            &converted.points[1].attributes,
            &converted.points[2].attributes
        ));
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn point_without_value_is_rejected() {
        let mut missing = number(1, vec![]);
        missing.value = None;
        let metric = gauge("cpu", vec![number(1, vec![]), missing]);
        let mut report = IngestReport::default();

        let converted = convert_metric(
            &metric,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
            &mut AttributeBuffer::new(),
            &mut report,
        )
        .unwrap();

        assert_eq!(converted.points.len(), 1);
        assert_eq!(report.rejected, 1);
        assert!(report.is_partial());
    }

    #[test]
    fn summary_metrics_are_rejected_per_point() {
        let metric = OtlpMetric {
            name: "latency".to_owned(),
            data: Some(metric::Data::Summary(Summary {
                data_points: vec![SummaryDataPoint::default(), SummaryDataPoint::default()],
            })),
            ..Default::default()
        };
        let mut report = IngestReport::default();

        let converted = convert_metric(
            &metric,
            &test_application("api"),
            &test_scope(),
            AttributeLimits::UNBOUNDED,
            &mut AttributeBuffer::new(),
            &mut report,
        );

        assert!(converted.is_none());
        assert_eq!(report.rejected, 2);
        assert_eq!(
            report.error_message.as_deref(),
            Some("metric latency has unsupported type summary")
        );
    }
}
