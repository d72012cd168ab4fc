//! Query filters.
//!
//! Each filter is a builder; unset fields match everything. Custom predicates
//! run last.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{LogLevel, LogRecord, MetricPoint, Span, Trace};

/// Half-open time range `[start, end)`; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// The unbounded window.
    pub const ALL: Self = Self {
        start: None,
        end: None,
    };

    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| time >= start) && self.end.map_or(true, |end| time < end)
    }
}

/// Caller-supplied match function.
pub struct Predicate<T>(Arc<dyn Fn(&T) -> bool + Send + Sync>);

impl<T> Predicate<T> {
    pub fn new(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, item: &T) -> bool {
        (self.0)(item)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

fn predicate_matches<T>(predicate: Option<&Predicate<T>>, item: &T) -> bool {
    predicate.map_or(true, |p| p.matches(item))
}

fn equals(expected: Option<&str>, actual: &str) -> bool {
    expected.map_or(true, |expected| expected == actual)
}

/// Hex ids compare without regard to case.
fn equals_ignore_case(expected: Option<&str>, actual: &str) -> bool {
    expected.map_or(true, |expected| expected.eq_ignore_ascii_case(actual))
}

fn contains(needle: Option<&str>, haystack: &str) -> bool {
    needle.map_or(true, |needle| haystack.contains(needle))
}

/// Filter over spans.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct SpanFilter {
    pub application: Option<String>,
    pub trace_id: Option<String>,
    /// Applied to the span start time.
    pub window: TimeWindow,
    pub name_contains: Option<String>,
    pub attribute: Option<(String, String)>,
    pub predicate: Option<Predicate<Span>>,
}

impl SpanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application(mut self, key: impl Into<String>) -> Self {
        self.application = Some(key.into());
        self
    }

    /// Match a hex trace id, case-insensitively.
    pub fn trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    pub const fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn name_contains(mut self, text: impl Into<String>) -> Self {
        self.name_contains = Some(text.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute = Some((key.into(), value.into()));
        self
    }

    pub fn predicate(mut self, f: impl Fn(&Span) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Predicate::new(f));
        self
    }

    pub fn matches(&self, span: &Span) -> bool {
        equals(self.application.as_deref(), &span.application.key)
            && equals_ignore_case(self.trace_id.as_deref(), &span.trace_id)
            && self.window.contains(span.start_time)
            && contains(self.name_contains.as_deref(), &span.name)
            && self
                .attribute
                .as_ref()
                .map_or(true, |(k, v)| span.attributes.contains(k, v))
            && predicate_matches(self.predicate.as_ref(), span)
    }
}

/// Filter over log records.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct LogFilter {
    pub application: Option<String>,
    pub trace_id: Option<String>,
    pub window: TimeWindow,
    pub min_severity: Option<LogLevel>,
    pub message_contains: Option<String>,
    pub attribute: Option<(String, String)>,
    pub predicate: Option<Predicate<LogRecord>>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application(mut self, key: impl Into<String>) -> Self {
        self.application = Some(key.into());
        self
    }

    pub fn trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    pub const fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub const fn min_severity(mut self, level: LogLevel) -> Self {
        self.min_severity = Some(level);
        self
    }

    pub fn message_contains(mut self, text: impl Into<String>) -> Self {
        self.message_contains = Some(text.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute = Some((key.into(), value.into()));
        self
    }

    pub fn predicate(mut self, f: impl Fn(&LogRecord) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Predicate::new(f));
        self
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        equals(self.application.as_deref(), &record.application.key)
            && equals_ignore_case(self.trace_id.as_deref(), &record.trace_id)
            && self.window.contains(record.time)
            && self.min_severity.map_or(true, |min| record.severity >= min)
            && contains(self.message_contains.as_deref(), &record.message)
            && self
                .attribute
                .as_ref()
                .map_or(true, |(k, v)| record.attributes.contains(k, v))
            && predicate_matches(self.predicate.as_ref(), record)
    }
}

/// Filter over metric data points.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct MetricFilter {
    pub application: Option<String>,
    pub scope: Option<String>,
    pub name: Option<String>,
    /// Applied to the data point time.
    pub window: TimeWindow,
}

impl MetricFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application(mut self, key: impl Into<String>) -> Self {
        self.application = Some(key.into());
        self
    }

    pub fn scope(mut self, name: impl Into<String>) -> Self {
        self.scope = Some(name.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub const fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn matches(&self, point: &MetricPoint) -> bool {
        let instrument = &point.instrument;
        equals(self.application.as_deref(), &instrument.application.key)
            && self.scope.as_deref().map_or(true, |s| s == instrument.scope.name)
            && self.name.as_deref().map_or(true, |n| n == instrument.name)
            && self.window.contains(point.point.time)
    }
}

/// Filter over assembled traces.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct TraceFilter {
    /// Keep traces with at least one span from this application.
    pub application: Option<String>,
    /// Substring of the trace's full name.
    pub name_contains: Option<String>,
}

impl TraceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application(mut self, key: impl Into<String>) -> Self {
        self.application = Some(key.into());
        self
    }

    pub fn name_contains(mut self, text: impl Into<String>) -> Self {
        self.name_contains = Some(text.into());
        self
    }

    pub fn matches(&self, trace: &Trace) -> bool {
        self.application
            .as_deref()
            .map_or(true, |key| trace.has_application(key))
            && contains(self.name_contains.as_deref(), &trace.full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{log_builder, span_builder};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn window_is_half_open() {
        let window = TimeWindow::new(Some(at(10)), Some(at(20)));
        assert!(!window.contains(at(9)));
        assert!(window.contains(at(10)));
        assert!(window.contains(at(19)));
        assert!(!window.contains(at(20)));
        assert!(TimeWindow::ALL.contains(at(0)));
        assert!(TimeWindow::new(None, Some(at(5))).contains(at(-100)));
    }

    #[test]
    fn span_filter_combines_conditions() {
        let span = span_builder("ABCD", "01")
            .application("api")
            .name("GET /orders")
            .attribute("http.method", "GET")
            .build();

        assert!(SpanFilter::new().matches(&span));
        assert!(SpanFilter::new().trace_id("abcd").matches(&span));
        assert!(SpanFilter::new()
            .application("api")
            .name_contains("orders")
            .attribute("http.method", "GET")
            .matches(&span));
        assert!(!SpanFilter::new().attribute("http.method", "POST").matches(&span));
        assert!(!SpanFilter::new().application("web").matches(&span));
        assert!(!SpanFilter::new().application("API").matches(&span));
        assert!(!SpanFilter::new()
            .predicate(|s| s.name.ends_with("users"))
            .matches(&span));
    }

    #[test]
    fn log_filter_min_severity() {
        let warning = log_builder("disk low").severity(LogLevel::Warning).build();
        let info = log_builder("started").severity(LogLevel::Information).build();

        let filter = LogFilter::new().min_severity(LogLevel::Warning);
        assert!(filter.matches(&warning));
        assert!(!filter.matches(&info));
        assert!(LogFilter::new().message_contains("disk").matches(&warning));
    }

    #[test]
    fn application_keys_match_exactly() {
        let record = log_builder("ready").build();
        let key = record.application.key.clone();

        assert!(LogFilter::new().application(key.as_str()).matches(&record));
        assert!(!LogFilter::new()
            .application(key.to_ascii_uppercase().as_str())
            .matches(&record));
    }
}
