//! Spans, span events and links.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::{Application, Scope};
use crate::attributes::Attributes;
use crate::ids::{from_hex, to_shortened_id};

/// Role of a span in a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SpanKind {
    #[default]
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    /// Map the OTLP enum value; unknown values are `Unspecified`.
    pub const fn from_otlp(kind: i32) -> Self {
        match kind {
            1 => Self::Internal,
            2 => Self::Server,
            3 => Self::Client,
            4 => Self::Producer,
            5 => Self::Consumer,
            _ => Self::Unspecified,
        }
    }

    /// Whether the span calls out to another service.
    pub const fn is_outgoing(self) -> bool {
        matches!(self, Self::Client | Self::Producer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

impl SpanStatus {
    pub const fn from_otlp(code: i32) -> Self {
        match code {
            1 => Self::Ok,
            2 => Self::Error,
            _ => Self::Unset,
        }
    }
}

/// A timestamped annotation on a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub time: DateTime<Utc>,
    pub attributes: Attributes,
}

impl SpanEvent {
    /// Time since the owning span started.
    pub fn time_offset(&self, span: &Span) -> TimeDelta {
        self.time - span.start_time
    }
}

/// A reference from one span to a span in another (or the same) trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanLink {
    pub trace_id: String,
    pub span_id: String,
    pub trace_state: String,
    pub attributes: Attributes,
}

/// A single timed operation.
///
/// Identifiers are stored in their lowercase hex display form; the raw bytes
/// are recoverable with [`Span::trace_id_bytes`].
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub application: Arc<Application>,
    pub scope: Arc<Scope>,
    pub trace_id: String,
    pub span_id: String,
    /// Empty for root spans.
    pub parent_span_id: String,
    pub trace_state: String,
    pub name: String,
    pub kind: SpanKind,
    pub status: SpanStatus,
    pub status_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,
}

impl Span {
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_empty()
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    pub fn trace_id_bytes(&self) -> Vec<u8> {
        from_hex(&self.trace_id).unwrap_or_default()
    }

    pub fn short_span_id(&self) -> &str {
        to_shortened_id(&self.span_id)
    }

    /// Resolved outgoing peer for client and producer spans.
    pub fn peer_address(&self) -> Option<String> {
        if self.kind.is_outgoing() {
            self.attributes.peer_address()
        } else {
            None
        }
    }
}
