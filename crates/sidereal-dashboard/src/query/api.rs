//! HTTP query API.
//!
//! Read-only axum routes over the telemetry store, returning JSON. Every list
//! endpoint pages with `start_index` and `count`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LogFilter, MetricFilter, PagedResult, ServiceMap, SpanFilter, TimeWindow, TraceFilter};
use crate::ids::from_hex;
use crate::model::{Application, InstrumentSummary, LogLevel, LogRecord, Metric, MetricPoint, Span, Trace};
use crate::store::TelemetryStore;
use crate::DashboardError;

/// Page size used when a request does not specify `count`.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page any request can ask for.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Query API state.
#[derive(Clone)]
pub struct QueryApiState {
    pub store: Arc<TelemetryStore>,
    /// Default page size (defaults to `DEFAULT_PAGE_SIZE`).
    pub default_page_size: usize,
    /// Maximum page size (defaults to `MAX_PAGE_SIZE`).
    pub max_page_size: usize,
}

impl QueryApiState {
    pub const fn new(store: Arc<TelemetryStore>) -> Self {
        Self {
            store,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    pub const fn with_page_sizes(
        store: Arc<TelemetryStore>,
        default_page_size: usize,
        max_page_size: usize,
    ) -> Self {
        Self {
            store,
            default_page_size,
            max_page_size,
        }
    }

    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}

/// Create the query API router.
pub fn query_router(state: QueryApiState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/applications", get(handle_applications))
        .route("/spans", get(handle_spans))
        .route("/traces", get(handle_traces))
        .route("/traces/{trace_id}", get(handle_trace))
        .route("/logs", get(handle_logs))
        .route("/logs/keys", get(handle_log_keys))
        .route("/metrics", get(handle_metric_points))
        .route("/metrics/{application}", get(handle_instruments))
        .route("/metrics/{application}/{scope}/{name}", get(handle_instrument))
        .route("/service-map", get(handle_service_map))
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Handle GET /health - liveness probe
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current change token, for cheap polling.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: u64,
}

async fn handle_version(State(state): State<QueryApiState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.store.version(),
    })
}

#[tracing::instrument(skip(state))]
async fn handle_applications(State(state): State<QueryApiState>) -> Json<Vec<Arc<Application>>> {
    Json(state.store.get_applications())
}

/// Query string for GET /spans.
#[derive(Debug, Default, Deserialize)]
pub struct SpanQueryParams {
    pub application: Option<String>,
    /// Hex-encoded trace id.
    pub trace_id: Option<String>,
    /// Substring of the span name.
    pub name: Option<String>,
    /// Start time (RFC 3339 format), inclusive.
    pub start_time: Option<String>,
    /// End time (RFC 3339 format), exclusive.
    pub end_time: Option<String>,
    pub attribute_key: Option<String>,
    pub attribute_value: Option<String>,
    #[serde(default)]
    pub start_index: usize,
    pub count: Option<usize>,
}

#[tracing::instrument(skip(state))]
async fn handle_spans(
    State(state): State<QueryApiState>,
    Query(params): Query<SpanQueryParams>,
) -> Result<Json<PagedResult<Arc<Span>>>, QueryError> {
    let mut filter = SpanFilter::new().window(parse_window(
        params.start_time.as_deref(),
        params.end_time.as_deref(),
    )?);
    if let Some(application) = params.application {
        filter = filter.application(application);
    }
    if let Some(trace_id) = params.trace_id {
        filter = filter.trace_id(validate_trace_id(&trace_id)?);
    }
    if let Some(name) = params.name {
        filter = filter.name_contains(name);
    }
    if let (Some(key), Some(value)) = (params.attribute_key, params.attribute_value) {
        filter = filter.attribute(key, value);
    }

    let count = state.page_size(params.count);
    Ok(Json(state.store.query_spans(
        &filter,
        params.start_index,
        Some(count),
    )))
}

/// Query string for GET /traces.
#[derive(Debug, Default, Deserialize)]
pub struct TraceQueryParams {
    pub application: Option<String>,
    /// Substring of the trace's full name.
    pub name: Option<String>,
    #[serde(default)]
    pub start_index: usize,
    pub count: Option<usize>,
}

#[tracing::instrument(skip(state))]
async fn handle_traces(
    State(state): State<QueryApiState>,
    Query(params): Query<TraceQueryParams>,
) -> Json<PagedResult<Trace>> {
    let mut filter = TraceFilter::new();
    if let Some(application) = params.application {
        filter = filter.application(application);
    }
    if let Some(name) = params.name {
        filter = filter.name_contains(name);
    }

    let count = state.page_size(params.count);
    Json(
        state
            .store
            .query_traces(&filter, params.start_index, Some(count)),
    )
}

#[tracing::instrument(skip(state))]
async fn handle_trace(
    State(state): State<QueryApiState>,
    Path(trace_id): Path<String>,
) -> Result<Json<Trace>, QueryError> {
    let trace_id = validate_trace_id(&trace_id)?;
    state
        .store
        .get_trace(&trace_id)
        .map(Json)
        .ok_or_else(|| QueryError::NotFound(format!("trace {trace_id} not found")))
}

/// Query string for GET /logs.
#[derive(Debug, Default, Deserialize)]
pub struct LogQueryParams {
    pub application: Option<String>,
    pub trace_id: Option<String>,
    /// Lowest level to include, e.g. `Warning`.
    pub min_severity: Option<LogLevel>,
    /// Substring of the message.
    pub message: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub attribute_key: Option<String>,
    pub attribute_value: Option<String>,
    #[serde(default)]
    pub start_index: usize,
    pub count: Option<usize>,
}

#[tracing::instrument(skip(state))]
async fn handle_logs(
    State(state): State<QueryApiState>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<PagedResult<Arc<LogRecord>>>, QueryError> {
    let mut filter = LogFilter::new().window(parse_window(
        params.start_time.as_deref(),
        params.end_time.as_deref(),
    )?);
    if let Some(application) = params.application {
        filter = filter.application(application);
    }
    if let Some(trace_id) = params.trace_id {
        filter = filter.trace_id(validate_trace_id(&trace_id)?);
    }
    if let Some(level) = params.min_severity {
        filter = filter.min_severity(level);
    }
    if let Some(message) = params.message {
        filter = filter.message_contains(message);
    }
    if let (Some(key), Some(value)) = (params.attribute_key, params.attribute_value) {
        filter = filter.attribute(key, value);
    }

    let count = state.page_size(params.count);
    Ok(Json(state.store.query_logs(
        &filter,
        params.start_index,
        Some(count),
    )))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogKeysParams {
    pub application: Option<String>,
}

async fn handle_log_keys(
    State(state): State<QueryApiState>,
    Query(params): Query<LogKeysParams>,
) -> Json<Vec<String>> {
    Json(state.store.log_property_keys(params.application.as_deref()))
}

/// Query string for GET /metrics.
#[derive(Debug, Default, Deserialize)]
pub struct MetricQueryParams {
    pub application: Option<String>,
    pub scope: Option<String>,
    pub name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_index: usize,
    pub count: Option<usize>,
}

#[tracing::instrument(skip(state))]
async fn handle_metric_points(
    State(state): State<QueryApiState>,
    Query(params): Query<MetricQueryParams>,
) -> Result<Json<PagedResult<MetricPoint>>, QueryError> {
    let mut filter = MetricFilter::new().window(parse_window(
        params.start_time.as_deref(),
        params.end_time.as_deref(),
    )?);
    if let Some(application) = params.application {
        filter = filter.application(application);
    }
    if let Some(scope) = params.scope {
        filter = filter.scope(scope);
    }
    if let Some(name) = params.name {
        filter = filter.name(name);
    }

    let count = state.page_size(params.count);
    Ok(Json(state.store.query_metrics(
        &filter,
        params.start_index,
        Some(count),
    )))
}

#[tracing::instrument(skip(state))]
async fn handle_instruments(
    State(state): State<QueryApiState>,
    Path(application): Path<String>,
) -> Json<Vec<InstrumentSummary>> {
    Json(state.store.get_instruments(&application))
}

#[tracing::instrument(skip(state))]
async fn handle_instrument(
    State(state): State<QueryApiState>,
    Path((application, scope, name)): Path<(String, String, String)>,
) -> Result<Json<Metric>, QueryError> {
    state
        .store
        .get_instrument(&application, &scope, &name)
        .map(Json)
        .ok_or_else(|| {
            QueryError::NotFound(format!("metric {scope}/{name} not found for {application}"))
        })
}

async fn handle_service_map(State(state): State<QueryApiState>) -> Json<ServiceMap> {
    Json(state.store.service_map())
}

fn validate_trace_id(trace_id: &str) -> Result<String, QueryError> {
    from_hex(trace_id).map_err(|e| {
        QueryError::from(DashboardError::InvalidArgument(format!(
            "invalid trace_id {trace_id:?}: {e}"
        )))
    })?;
    Ok(trace_id.to_ascii_lowercase())
}

fn parse_time(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, QueryError> {
    value
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|time| time.with_timezone(&Utc))
                .map_err(|e| QueryError::InvalidRequest(format!("invalid {field}: {e}")))
        })
        .transpose()
}

fn parse_window(start: Option<&str>, end: Option<&str>) -> Result<TimeWindow, QueryError> {
    Ok(TimeWindow::new(
        parse_time(start, "start_time")?,
        parse_time(end, "end_time")?,
    ))
}

/// Query API error.
#[derive(Debug)]
pub enum QueryError {
    InvalidRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DashboardError> for QueryError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::InvalidArgument(msg) => Self::InvalidRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => {
                // Log internal errors but return generic message
                tracing::error!(error = %msg, "internal API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
