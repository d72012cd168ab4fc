//! Traces assembled on demand from spans sharing a trace id.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::{Application, Span};

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub trace_id: String,
    /// `"<root application>: <root span name>"`, or the earliest span's
    /// name while the root has not arrived.
    pub full_name: String,
    pub first_span_start: DateTime<Utc>,
    pub last_span_end: DateTime<Utc>,
    /// Distinct applications in order of first appearance.
    pub applications: Vec<Arc<Application>>,
    /// Ordered by start time.
    pub spans: Vec<Arc<Span>>,
}

impl Trace {
    /// Group spans into a trace. Returns `None` when there are no spans.
    pub fn from_spans<'a>(
        trace_id: &str,
        spans: impl IntoIterator<Item = &'a Arc<Span>>,
    ) -> Option<Self> {
        let mut spans: Vec<Arc<Span>> = spans.into_iter().cloned().collect();
        spans.sort_by_key(|span| span.start_time);

        let first = spans.first()?;
        let first_span_start = first.start_time;
        let last_span_end = spans
            .iter()
            .map(|span| span.end_time)
            .max()
            .unwrap_or(first.end_time);

        let named = spans.iter().find(|span| span.is_root()).unwrap_or(first);
        let full_name = format!("{}: {}", named.application.name, named.name);

        let mut applications: Vec<Arc<Application>> = Vec::new();
        for span in &spans {
            if !applications.iter().any(|app| app.key == span.application.key) {
                applications.push(Arc::clone(&span.application));
            }
        }

        Some(Self {
            trace_id: trace_id.to_owned(),
            full_name,
            first_span_start,
            last_span_end,
            applications,
            spans,
        })
    }

    /// First span with no parent.
    pub fn root_span(&self) -> Option<&Arc<Span>> {
        self.spans.iter().find(|span| span.is_root())
    }

    pub fn duration(&self) -> TimeDelta {
        self.last_span_end - self.first_span_start
    }

    pub fn has_application(&self, key: &str) -> bool {
        self.applications.iter().any(|app| app.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::span_builder;

    #[test]
    fn empty_trace_is_none() {
        assert!(Trace::from_spans("01", &[]).is_none());
    }

    #[test]
    fn orders_spans_and_names_after_root() {
        let child = Arc::new(
            span_builder("01", "02")
                .application("backend")
                .parent("01")
                .name("SELECT")
                .start_ms(1_500)
                .end_ms(1_800)
                .build(),
        );
        let root = Arc::new(
            span_builder("01", "01")
                .application("frontend")
                .name("GET /")
                .start_ms(1_000)
                .end_ms(2_000)
                .build(),
        );

        let trace = Trace::from_spans("01", &[child, root]).unwrap();
        assert_eq!(trace.full_name, "frontend: GET /");
        assert_eq!(trace.spans[0].span_id, "01");
        assert_eq!(trace.root_span().map(|s| s.name.as_str()), Some("GET /"));
        assert_eq!(trace.duration(), TimeDelta::milliseconds(1_000));
        assert_eq!(trace.applications.len(), 2);
        assert!(trace.has_application("backend"));
    }

    #[test]
    fn missing_root_uses_earliest_span() {
        let orphan = Arc::new(
            span_builder("01", "02")
                .application("backend")
                .parent("ff")
                .name("work")
                .build(),
        );
        let trace = Trace::from_spans("01", &[orphan]).unwrap();
        assert!(trace.root_span().is_none());
        assert_eq!(trace.full_name, "backend: work");
    }
}
