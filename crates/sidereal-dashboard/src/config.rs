//! Configuration types for the dashboard telemetry store.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{DashboardError, Result};

// ============================================================================
// Default configuration constants
// ============================================================================

/// Default OTLP gRPC port (OpenTelemetry standard).
pub const DEFAULT_GRPC_PORT: u16 = 4317;

/// Default port for the dashboard query API.
pub const DEFAULT_HTTP_PORT: u16 = 18888;

/// Default maximum metric data points retained per application.
pub const DEFAULT_METRICS_COUNT_LIMIT: usize = 10_000;

/// Default maximum attributes retained per entity.
pub const DEFAULT_ATTRIBUTE_COUNT_LIMIT: usize = 128;

/// Default maximum characters retained per attribute value (unbounded).
pub const DEFAULT_ATTRIBUTE_LENGTH_LIMIT: usize = usize::MAX;

/// Default maximum spans retained per application.
pub const DEFAULT_MAX_SPAN_COUNT: usize = 10_000;

/// Default maximum log records retained per application.
pub const DEFAULT_MAX_LOG_COUNT: usize = 10_000;

/// Default number of change notifications buffered per subscriber.
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 1024;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DASHBOARD_";

/// Dashboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Listen addresses.
    pub server: ServerConfig,
    /// Store limits.
    pub telemetry: TelemetryLimits,
}

impl DashboardConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order (later sources override earlier):
    /// 1. Default values
    /// 2. `dashboard.toml` in current directory
    /// 3. Environment variables prefixed with `DASHBOARD_`, nested keys split on `__`
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &str) -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Extract and validate configuration from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.telemetry.validate()?;
        Ok(config)
    }
}

/// Server address configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// OTLP gRPC address (default: 0.0.0.0:4317).
    pub grpc_addr: SocketAddr,
    /// Query API address (default: 0.0.0.0:18888).
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_GRPC_PORT)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
        }
    }
}

/// Bounds applied to everything the store retains.
///
/// Every collection is FIFO: once a limit is reached the oldest entry is
/// evicted to make room for the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryLimits {
    /// Maximum metric data points retained per application.
    pub metrics_count_limit: usize,
    /// Maximum attributes retained per entity; later attributes are dropped.
    pub attribute_count_limit: usize,
    /// Maximum characters retained per attribute value.
    pub attribute_length_limit: usize,
    /// Maximum spans retained per application.
    pub max_span_count: usize,
    /// Maximum log records retained per application.
    pub max_log_count: usize,
    /// Change notifications buffered per subscriber before it starts lagging.
    pub subscription_capacity: usize,
}

impl Default for TelemetryLimits {
    fn default() -> Self {
        Self {
            metrics_count_limit: DEFAULT_METRICS_COUNT_LIMIT,
            attribute_count_limit: DEFAULT_ATTRIBUTE_COUNT_LIMIT,
            attribute_length_limit: DEFAULT_ATTRIBUTE_LENGTH_LIMIT,
            max_span_count: DEFAULT_MAX_SPAN_COUNT,
            max_log_count: DEFAULT_MAX_LOG_COUNT,
            subscription_capacity: DEFAULT_SUBSCRIPTION_CAPACITY,
        }
    }
}

impl TelemetryLimits {
    /// Reject limits that would make the store unusable.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("metrics_count_limit", self.metrics_count_limit),
            ("attribute_count_limit", self.attribute_count_limit),
            ("attribute_length_limit", self.attribute_length_limit),
            ("max_span_count", self.max_span_count),
            ("max_log_count", self.max_log_count),
            ("subscription_capacity", self.subscription_capacity),
        ];

        for (name, value) in limits {
            if value == 0 {
                return Err(DashboardError::InvalidLimit { name, value });
            }
        }
        Ok(())
    }
}
