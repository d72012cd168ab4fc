//! Sidereal Dashboard binary entry point.
//!
//! Starts the dashboard telemetry service with:
//! - OTLP gRPC receiver (port 4317)
//! - Query API (port 18888)

use std::sync::Arc;

use sidereal_dashboard::{
    ingest::{LogsServiceServer, MetricsServiceServer, OtlpGrpcReceiver, TraceServiceServer},
    query::{query_router, QueryApiState},
    DashboardConfig, DashboardError, StoreChange, TelemetryStore,
};
use tokio::{signal, sync::broadcast};
use tonic::transport::Server as TonicServer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> sidereal_dashboard::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sidereal_dashboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting sidereal-dashboard");

    let config = DashboardConfig::load()?;
    tracing::info!(
        grpc_addr = %config.server.grpc_addr,
        http_addr = %config.server.http_addr,
        max_span_count = config.telemetry.max_span_count,
        max_log_count = config.telemetry.max_log_count,
        metrics_count_limit = config.telemetry.metrics_count_limit,
        "Configuration loaded"
    );

    let store = Arc::new(TelemetryStore::new(config.telemetry)?);
    let watcher = tokio::spawn(log_store_changes(store.subscribe()));

    let grpc_receiver = OtlpGrpcReceiver::new(Arc::clone(&store));
    let grpc_addr = config.server.grpc_addr;
    let http_addr = config.server.http_addr;

    let grpc_server = TonicServer::builder()
        .add_service(TraceServiceServer::new(grpc_receiver.clone()))
        .add_service(MetricsServiceServer::new(grpc_receiver.clone()))
        .add_service(LogsServiceServer::new(grpc_receiver))
        .serve_with_shutdown(grpc_addr, shutdown_signal("gRPC"));

    let api_router = query_router(QueryApiState::new(store)).layer(TraceLayer::new_for_http());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server =
        axum::serve(http_listener, api_router).with_graceful_shutdown(shutdown_signal("Query API"));

    tracing::info!(grpc = %grpc_addr, http = %http_addr, "Servers starting");

    let served = tokio::select! {
        result = grpc_server => result.map_err(DashboardError::from).inspect_err(|e| {
            tracing::error!(error = %e, "gRPC server error");
        }),
        result = http_server => result.map_err(DashboardError::from).inspect_err(|e| {
            tracing::error!(error = %e, "Query API server error");
        }),
    };

    watcher.abort();
    tracing::info!("Shutdown complete");
    served
}

/// Log store changes until the store is dropped.
async fn log_store_changes(mut changes: broadcast::Receiver<StoreChange>) {
    loop {
        match changes.recv().await {
            Ok(StoreChange::ApplicationAdded { application, .. }) => {
                tracing::info!(
                    application = %application.display_name(),
                    "Application connected"
                );
            }
            Ok(change) => {
                tracing::trace!(version = change.version(), "Store changed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Change watcher lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Create a shutdown signal future for graceful shutdown.
async fn shutdown_signal(server_name: &'static str) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!(server = server_name, "Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!(server = server_name, "Received SIGTERM, initiating shutdown");
        }
    }
}
