//! tonic gRPC OTLP receivers.
//!
//! Implements the TraceService, MetricsService, and LogsService gRPC services
//! from the OpenTelemetry collector protocol on top of the telemetry store.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::{
    logs::v1::{
        logs_service_server::LogsService, ExportLogsPartialSuccess, ExportLogsServiceRequest,
        ExportLogsServiceResponse,
    },
    metrics::v1::{
        metrics_service_server::MetricsService, ExportMetricsPartialSuccess,
        ExportMetricsServiceRequest, ExportMetricsServiceResponse,
    },
    trace::v1::{
        trace_service_server::TraceService, ExportTracePartialSuccess, ExportTraceServiceRequest,
        ExportTraceServiceResponse,
    },
};
use tonic::{Request, Response, Status};

use super::convert::IngestReport;
use crate::store::TelemetryStore;

/// Trait for building partial_success responses from an IngestReport.
trait PartialSuccessBuilder: Default {
    fn with_rejected_count(count: i64) -> Self;
    fn with_error_message(self, message: String) -> Self;
}

impl PartialSuccessBuilder for ExportTracePartialSuccess {
    fn with_rejected_count(count: i64) -> Self {
        Self {
            rejected_spans: count,
            error_message: String::new(),
        }
    }
    fn with_error_message(mut self, message: String) -> Self {
        self.error_message = message;
        self
    }
}

impl PartialSuccessBuilder for ExportMetricsPartialSuccess {
    fn with_rejected_count(count: i64) -> Self {
        Self {
            rejected_data_points: count,
            error_message: String::new(),
        }
    }
    fn with_error_message(mut self, message: String) -> Self {
        self.error_message = message;
        self
    }
}

impl PartialSuccessBuilder for ExportLogsPartialSuccess {
    fn with_rejected_count(count: i64) -> Self {
        Self {
            rejected_log_records: count,
            error_message: String::new(),
        }
    }
    fn with_error_message(mut self, message: String) -> Self {
        self.error_message = message;
        self
    }
}

/// Build a partial_success response. `None` when everything was accepted.
fn build_partial_success<T: PartialSuccessBuilder>(report: &IngestReport) -> Option<T> {
    if !report.is_partial() {
        return None;
    }

    let rejected = i64::try_from(report.rejected).unwrap_or(i64::MAX);
    let partial = T::with_rejected_count(rejected);
    Some(match &report.error_message {
        Some(msg) => partial.with_error_message(msg.clone()),
        None => partial,
    })
}

/// gRPC receiver for all OTLP signals.
#[derive(Clone)]
pub struct OtlpGrpcReceiver {
    store: Arc<TelemetryStore>,
}

impl OtlpGrpcReceiver {
    pub const fn new(store: Arc<TelemetryStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl TraceService for OtlpGrpcReceiver {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let report = self.store.add_traces(request.get_ref());

        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: build_partial_success(&report),
        }))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpGrpcReceiver {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let report = self.store.add_metrics(request.get_ref());

        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: build_partial_success(&report),
        }))
    }
}

#[tonic::async_trait]
impl LogsService for OtlpGrpcReceiver {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let report = self.store.add_logs(request.get_ref());

        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: build_partial_success(&report),
        }))
    }
}

/// Re-export the service servers for convenience.
pub use opentelemetry_proto::tonic::collector::{
    logs::v1::logs_service_server::LogsServiceServer,
    metrics::v1::metrics_service_server::MetricsServiceServer,
    trace::v1::trace_service_server::TraceServiceServer,
};
