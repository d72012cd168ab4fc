//! Bounded in-memory telemetry store.
//!
//! A single [`parking_lot::RwLock`] guards every application's collections
//! and the trace index. Writers hold the lock for one resource block at a
//! time, so a reader never observes a partially appended entity and appends
//! to one application are applied in arrival order. Readers clone `Arc`s out
//! of the snapshot they saw and release the lock before returning.
//!
//! ```text
//! add_traces / add_logs / add_metrics
//!        │  convert resource (no lock)
//!        ▼
//!   write lock per resource block ─► register app ─► convert + append ─► evict
//!        │
//!        ▼
//!   version bump + broadcast (once per call)
//! ```

mod bounded;
mod notify;
mod state;

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::{
    logs::v1::ExportLogsServiceRequest, metrics::v1::ExportMetricsServiceRequest,
    trace::v1::ExportTraceServiceRequest,
};
use parking_lot::RwLock;
use tokio::sync::broadcast;

pub use notify::{Signal, StoreChange};

use self::notify::Notifier;
use self::state::{merge_by_arrival, StoreState};
use crate::attributes::{AttributeBuffer, AttributeLimits};
use crate::config::TelemetryLimits;
use crate::error::Result;
use crate::ingest::{
    convert_log_record, convert_metric, convert_resource, convert_scope, convert_span,
    IngestReport,
};
use crate::model::{
    Application, InstrumentSummary, LogRecord, Metric, MetricPoint, Resource, Span, Trace,
};
use crate::query::{
    build_service_map, paginate, LogFilter, MetricFilter, PagedResult, ServiceMap, SpanFilter,
    TraceFilter,
};

/// Applications created and touched by one ingestion call.
#[derive(Debug, Default)]
struct BatchChanges {
    added: Vec<Arc<Application>>,
    touched: Vec<String>,
}

impl BatchChanges {
    fn touch(&mut self, key: &str) {
        if !self.touched.iter().any(|k| k == key) {
            self.touched.push(key.to_owned());
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.touched.is_empty()
    }
}

/// Shared telemetry store.
///
/// Construct once at startup and share as `Arc<TelemetryStore>`.
#[derive(Debug)]
pub struct TelemetryStore {
    limits: TelemetryLimits,
    attribute_limits: AttributeLimits,
    state: RwLock<StoreState>,
    notifier: Notifier,
}

impl TelemetryStore {
    /// Create an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::InvalidLimit`](crate::DashboardError::InvalidLimit)
    /// when any limit is zero.
    pub fn new(limits: TelemetryLimits) -> Result<Self> {
        limits.validate()?;

        Ok(Self {
            limits,
            attribute_limits: AttributeLimits::from(&limits),
            state: RwLock::new(StoreState::new(limits)),
            notifier: Notifier::new(limits.subscription_capacity),
        })
    }

    pub const fn limits(&self) -> &TelemetryLimits {
        &self.limits
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Store the spans of one OTLP trace export.
    pub fn add_traces(&self, request: &ExportTraceServiceRequest) -> IngestReport {
        let mut report = IngestReport::default();
        let mut changes = BatchChanges::default();

        for resource_spans in &request.resource_spans {
            let resource = convert_resource(resource_spans.resource.as_ref(), self.attribute_limits);
            let mut state = self.state.write();
            let application = Self::register(&mut state, resource, &mut changes);
            let before = report.accepted;

            for scope_spans in &resource_spans.scope_spans {
                let scope = state.scope(
                    &application,
                    convert_scope(scope_spans.scope.as_ref(), self.attribute_limits),
                );
                for span in &scope_spans.spans {
                    match convert_span(span, &application, &scope, self.attribute_limits) {
                        Ok(span) => {
                            state.append_span(Arc::new(span));
                            report.accepted += 1;
                        }
                        Err(rejection) => report.reject(&rejection),
                    }
                }
            }

            if report.accepted > before {
                changes.touch(&application.key);
            }
        }

        self.publish(Signal::Traces, &report, changes);
        report
    }

    /// Store the log records of one OTLP logs export.
    pub fn add_logs(&self, request: &ExportLogsServiceRequest) -> IngestReport {
        let mut report = IngestReport::default();
        let mut changes = BatchChanges::default();

        for resource_logs in &request.resource_logs {
            let resource = convert_resource(resource_logs.resource.as_ref(), self.attribute_limits);
            let mut state = self.state.write();
            let application = Self::register(&mut state, resource, &mut changes);
            let before = report.accepted;

            for scope_logs in &resource_logs.scope_logs {
                let scope = state.scope(
                    &application,
                    convert_scope(scope_logs.scope.as_ref(), self.attribute_limits),
                );
                for record in &scope_logs.log_records {
                    match convert_log_record(record, &application, &scope, self.attribute_limits)
                    {
                        Ok(record) => {
                            state.append_log(Arc::new(record));
                            report.accepted += 1;
                        }
                        Err(rejection) => report.reject(&rejection),
                    }
                }
            }

            if report.accepted > before {
                changes.touch(&application.key);
            }
        }

        self.publish(Signal::Logs, &report, changes);
        report
    }

    /// Store the data points of one OTLP metrics export.
    pub fn add_metrics(&self, request: &ExportMetricsServiceRequest) -> IngestReport {
        let mut report = IngestReport::default();
        let mut changes = BatchChanges::default();
        let mut buffer = AttributeBuffer::new();

        for resource_metrics in &request.resource_metrics {
            let resource =
                convert_resource(resource_metrics.resource.as_ref(), self.attribute_limits);
            let mut state = self.state.write();
            let application = Self::register(&mut state, resource, &mut changes);
            let before = report.accepted;

            for scope_metrics in &resource_metrics.scope_metrics {
                let scope = state.scope(
                    &application,
                    convert_scope(scope_metrics.scope.as_ref(), self.attribute_limits),
                );
                for metric in &scope_metrics.metrics {
                    let converted = convert_metric(
                        metric,
                        &application,
                        &scope,
                        self.attribute_limits,
                        &mut buffer,
                        &mut report,
                    );
                    if let Some(converted) = converted.filter(|c| !c.points.is_empty()) {
                        let count = converted.points.len();
                        match state.append_metric(converted) {
                            Ok(()) => report.accepted += count,
                            Err(rejection) => report.reject_many(count, &rejection),
                        }
                    }
                }
            }

            if report.accepted > before {
                changes.touch(&application.key);
            }
        }

        self.publish(Signal::Metrics, &report, changes);
        report
    }

    fn register(
        state: &mut StoreState,
        resource: Resource,
        changes: &mut BatchChanges,
    ) -> Arc<Application> {
        let (application, created) = state.register(resource);
        if created {
            tracing::info!(
                application = %application.key,
                name = %application.name,
                "New application"
            );
            changes.added.push(Arc::clone(&application));
        }
        application
    }

    fn publish(&self, signal: Signal, report: &IngestReport, changes: BatchChanges) {
        tracing::debug!(
            signal = %signal,
            applications = ?changes.touched,
            accepted = report.accepted,
            rejected = report.rejected,
            "Ingested batch"
        );

        if changes.is_empty() {
            return;
        }

        let version = self.notifier.bump();
        for application in changes.added {
            self.notifier
                .send(StoreChange::ApplicationAdded { application, version });
        }
        if !changes.touched.is_empty() {
            self.notifier.send(StoreChange::Updated {
                signal,
                version,
                applications: changes.touched,
            });
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// All applications, ordered by name then instance id.
    pub fn get_applications(&self) -> Vec<Arc<Application>> {
        let mut applications: Vec<_> = self
            .state
            .read()
            .applications
            .values()
            .map(|state| Arc::clone(&state.application))
            .collect();
        applications.sort_by(|a, b| (&a.name, &a.instance_id).cmp(&(&b.name, &b.instance_id)));
        applications
    }

    pub fn get_application(&self, key: &str) -> Option<Arc<Application>> {
        self.state
            .read()
            .application(key)
            .map(|state| Arc::clone(&state.application))
    }

    /// Page through spans matching `filter`, in arrival order.
    pub fn query_spans(
        &self,
        filter: &SpanFilter,
        start_index: usize,
        count: Option<usize>,
    ) -> PagedResult<Arc<Span>> {
        let state = self.state.read();

        // The trace index already holds the spans of a trace in arrival order.
        if let (Some(trace_id), None) = (&filter.trace_id, &filter.application) {
            let spans = state.trace_spans(trace_id).into_iter().flatten();
            return paginate(spans.filter(|s| filter.matches(s)), start_index, count)
                .map(Arc::clone);
        }

        let spans = merge_by_arrival(
            state
                .select(filter.application.as_deref())
                .map(|app| &app.spans),
        );
        paginate(
            spans.into_iter().filter(|s| filter.matches(s)),
            start_index,
            count,
        )
        .map(Arc::clone)
    }

    /// Page through log records matching `filter`, in arrival order.
    pub fn query_logs(
        &self,
        filter: &LogFilter,
        start_index: usize,
        count: Option<usize>,
    ) -> PagedResult<Arc<LogRecord>> {
        let state = self.state.read();
        let records = merge_by_arrival(
            state
                .select(filter.application.as_deref())
                .map(|app| &app.logs),
        );
        paginate(
            records.into_iter().filter(|r| filter.matches(r)),
            start_index,
            count,
        )
        .map(Arc::clone)
    }

    /// Page through metric data points matching `filter`, in arrival order.
    pub fn query_metrics(
        &self,
        filter: &MetricFilter,
        start_index: usize,
        count: Option<usize>,
    ) -> PagedResult<MetricPoint> {
        let state = self.state.read();
        let points = merge_by_arrival(
            state
                .select(filter.application.as_deref())
                .map(|app| &app.metric_points),
        );
        paginate(
            points.into_iter().filter(|p| filter.matches(p)),
            start_index,
            count,
        )
        .map(MetricPoint::clone)
    }

    /// Page through traces matching `filter`, ordered by first span start.
    pub fn query_traces(
        &self,
        filter: &TraceFilter,
        start_index: usize,
        count: Option<usize>,
    ) -> PagedResult<Trace> {
        let mut traces: Vec<Trace> = {
            let state = self.state.read();
            state
                .traces
                .iter()
                .filter_map(|(trace_id, spans)| Trace::from_spans(trace_id, spans))
                .collect()
        };
        traces.retain(|trace| filter.matches(trace));
        traces.sort_by(|a, b| {
            a.first_span_start
                .cmp(&b.first_span_start)
                .then_with(|| a.trace_id.cmp(&b.trace_id))
        });
        paginate(traces, start_index, count)
    }

    /// Assemble one trace. Accepts either hex case.
    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        let state = self.state.read();
        let spans = state.trace_spans(trace_id)?;
        Trace::from_spans(&trace_id.to_ascii_lowercase(), spans)
    }

    /// Instruments of an application in first-seen order.
    pub fn get_instruments(&self, application: &str) -> Vec<InstrumentSummary> {
        self.state
            .read()
            .application(application)
            .map(state::ApplicationState::instrument_summaries)
            .unwrap_or_default()
    }

    /// One instrument with all of its retained data points.
    pub fn get_instrument(&self, application: &str, scope: &str, name: &str) -> Option<Metric> {
        self.state.read().application(application)?.metric(scope, name)
    }

    /// Sorted distinct attribute keys across retained log records.
    pub fn log_property_keys(&self, application: Option<&str>) -> Vec<String> {
        self.state.read().log_property_keys(application)
    }

    /// Service dependency graph over all retained spans.
    pub fn service_map(&self) -> ServiceMap {
        let state = self.state.read();
        build_service_map(state.traces.values())
    }

    /// Number of spans, logs and metric points retained for an application.
    pub fn counts(&self, application: &str) -> Option<EntityCounts> {
        self.state.read().application(application).map(|state| EntityCounts {
            spans: state.spans.len(),
            logs: state.logs.len(),
            metric_points: state.metric_points.len(),
        })
    }

    /// Number of distinct trace ids currently indexed.
    pub fn trace_count(&self) -> usize {
        self.state.read().traces.len()
    }

    // ------------------------------------------------------------------
    // Change notification
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.notifier.subscribe()
    }

    /// Current change token. Bumped once per ingestion call that stored data
    /// or created an application.
    pub fn version(&self) -> u64 {
        self.notifier.version()
    }

    pub fn has_changed_since(&self, token: u64) -> bool {
        self.version() > token
    }

    /// Drop all applications and entities.
    pub fn clear(&self) {
        self.state.write().clear();
        let version = self.notifier.bump();
        tracing::info!(version, "Cleared telemetry store");
        self.notifier.send(StoreChange::Cleared { version });
    }
}

/// Retained entity counts for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EntityCounts {
    pub spans: usize,
    pub logs: usize,
    pub metric_points: usize,
}
