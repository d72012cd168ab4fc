//! Structured log records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Application, Scope};
use crate::attributes::Attributes;

/// Severity bucket derived from the OTLP severity number.
///
/// Ordered so that `Unspecified` is the lowest level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LogLevel {
    #[default]
    Unspecified,
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Map an OTLP severity number (1..=24, four per level).
    pub const fn from_severity_number(number: i32) -> Self {
        match number {
            1..=4 => Self::Trace,
            5..=8 => Self::Debug,
            9..=12 => Self::Information,
            13..=16 => Self::Warning,
            17..=20 => Self::Error,
            21..=24 => Self::Critical,
            _ => Self::Unspecified,
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub application: Arc<Application>,
    pub scope: Arc<Scope>,
    pub time: DateTime<Utc>,
    pub severity: LogLevel,
    pub severity_text: String,
    /// Display form of the log body.
    pub message: String,
    /// Message template, when the emitter supplied one.
    pub original_format: Option<String>,
    pub attributes: Attributes,
    /// Empty when the record is not correlated with a trace.
    pub trace_id: String,
    pub span_id: String,
    pub flags: u32,
}

impl LogRecord {
    /// Logger category, taken from the instrumentation scope name.
    pub fn category(&self) -> &str {
        &self.scope.name
    }
}
