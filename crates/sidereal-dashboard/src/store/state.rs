//! Store contents guarded by the store lock.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use super::bounded::BoundedLog;
use crate::config::TelemetryLimits;
use crate::ingest::{ConvertedMetric, Rejection};
use crate::model::{
    Application, DataPoint, Instrument, InstrumentSummary, LogRecord, Metric, MetricPoint,
    Resource, Scope, Span,
};

/// An instrument and its retained points, oldest first.
#[derive(Debug)]
struct InstrumentState {
    instrument: Arc<Instrument>,
    points: VecDeque<Arc<DataPoint>>,
}

/// Everything stored for one application.
#[derive(Debug)]
pub(crate) struct ApplicationState {
    pub(crate) application: Arc<Application>,
    scopes: HashMap<String, Arc<Scope>>,
    pub(crate) spans: BoundedLog<Arc<Span>>,
    pub(crate) logs: BoundedLog<Arc<LogRecord>>,
    pub(crate) metric_points: BoundedLog<MetricPoint>,
    /// scope name -> metric name -> instrument
    instruments: HashMap<String, HashMap<String, InstrumentState>>,
    /// Instruments in the order they were first seen.
    instrument_order: Vec<Arc<Instrument>>,
}

impl ApplicationState {
    fn new(application: Arc<Application>, limits: &TelemetryLimits) -> Self {
        Self {
            application,
            scopes: HashMap::new(),
            spans: BoundedLog::new(limits.max_span_count),
            logs: BoundedLog::new(limits.max_log_count),
            metric_points: BoundedLog::new(limits.metrics_count_limit),
            instruments: HashMap::new(),
            instrument_order: Vec::new(),
        }
    }

    fn instrument(&self, scope: &str, name: &str) -> Option<&InstrumentState> {
        self.instruments.get(scope)?.get(name)
    }

    pub(crate) fn instrument_summaries(&self) -> Vec<InstrumentSummary> {
        self.instrument_order
            .iter()
            .map(|instrument| InstrumentSummary {
                scope: instrument.scope.name.clone(),
                name: instrument.name.clone(),
                description: instrument.description.clone(),
                unit: instrument.unit.clone(),
                kind: instrument.kind,
                data_point_count: self
                    .instrument(&instrument.scope.name, &instrument.name)
                    .map_or(0, |state| state.points.len()),
            })
            .collect()
    }

    pub(crate) fn metric(&self, scope: &str, name: &str) -> Option<Metric> {
        self.instrument(scope, name).map(|state| Metric {
            instrument: Arc::clone(&state.instrument),
            data_points: state.points.iter().cloned().collect(),
        })
    }
}

/// All applications plus the cross-application trace index.
#[derive(Debug)]
pub(crate) struct StoreState {
    limits: TelemetryLimits,
    pub(crate) applications: HashMap<String, ApplicationState>,
    /// trace id -> spans in arrival order
    pub(crate) traces: HashMap<String, VecDeque<Arc<Span>>>,
    next_seq: u64,
}

impl StoreState {
    pub(crate) fn new(limits: TelemetryLimits) -> Self {
        Self {
            limits,
            applications: HashMap::new(),
            traces: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Resolve the application for a resource, creating it on first sight.
    ///
    /// The first resource seen for a key defines the application's metadata.
    /// Returns `true` alongside the application when it was created.
    pub(crate) fn register(&mut self, resource: Resource) -> (Arc<Application>, bool) {
        if let Some(state) = self.applications.get(resource.service_id()) {
            return (Arc::clone(&state.application), false);
        }

        let application = Arc::new(Application::from_resource(resource));
        self.applications.insert(
            application.key.clone(),
            ApplicationState::new(Arc::clone(&application), &self.limits),
        );
        (application, true)
    }

    /// Resolve a scope under an application; the first scope seen with a name
    /// wins.
    pub(crate) fn scope(&mut self, application: &Arc<Application>, scope: Scope) -> Arc<Scope> {
        let state = self.application_mut(application);
        Arc::clone(
            state
                .scopes
                .entry(scope.name.clone())
                .or_insert_with(|| Arc::new(scope)),
        )
    }

    pub(crate) fn append_span(&mut self, span: Arc<Span>) {
        let seq = self.next_seq();
        let state = self.application_mut(&span.application);
        let evicted = state.spans.push(seq, Arc::clone(&span));

        self.traces
            .entry(span.trace_id.clone())
            .or_default()
            .push_back(span);

        if let Some(evicted) = evicted {
            self.unindex_span(&evicted);
        }
    }

    pub(crate) fn append_log(&mut self, record: Arc<LogRecord>) {
        let seq = self.next_seq();
        let state = self.application_mut(&record.application);
        state.logs.push(seq, record);
    }

    /// Append converted points to their instrument.
    ///
    /// The first export of an instrument fixes its kind; points of another
    /// kind under the same scope and name are refused.
    pub(crate) fn append_metric(&mut self, converted: ConvertedMetric) -> Result<(), Rejection> {
        let first_seq = self.next_seq;
        let point_count = converted.points.len() as u64;
        let state = self.application_mut(&converted.instrument.application);
        let scope_name = converted.instrument.scope.name.clone();
        let metric_name = converted.instrument.name.clone();

        let by_name = state.instruments.entry(scope_name).or_default();
        let instrument = match by_name.get(&metric_name) {
            Some(existing) if existing.instrument.kind != converted.instrument.kind => {
                return Err(Rejection::KindMismatch {
                    name: metric_name,
                    registered: existing.instrument.kind,
                    received: converted.instrument.kind,
                });
            }
            Some(existing) => Arc::clone(&existing.instrument),
            None => {
                state
                    .instrument_order
                    .push(Arc::clone(&converted.instrument));
                by_name.insert(
                    metric_name,
                    InstrumentState {
                        instrument: Arc::clone(&converted.instrument),
                        points: VecDeque::new(),
                    },
                );
                converted.instrument
            }
        };

        for (seq, point) in (first_seq..).zip(converted.points) {
            if let Some(target) = state
                .instruments
                .get_mut(&instrument.scope.name)
                .and_then(|by_name| by_name.get_mut(&instrument.name))
            {
                target.points.push_back(Arc::clone(&point));
            }

            let evicted = state.metric_points.push(
                seq,
                MetricPoint {
                    instrument: Arc::clone(&instrument),
                    point,
                },
            );

            // The evicted point is the oldest in the application, so it is
            // also the oldest of its own instrument.
            if let Some(evicted) = evicted {
                if let Some(owner) = state
                    .instruments
                    .get_mut(&evicted.instrument.scope.name)
                    .and_then(|by_name| by_name.get_mut(&evicted.instrument.name))
                {
                    owner.points.pop_front();
                }
            }
        }

        self.next_seq += point_count;
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.applications.clear();
        self.traces.clear();
    }

    /// Applications whose key matches, or all of them.
    pub(crate) fn select<'a>(
        &'a self,
        key: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ApplicationState> + 'a {
        self.applications
            .values()
            .filter(move |state| key.map_or(true, |key| state.application.key == key))
    }

    pub(crate) fn application(&self, key: &str) -> Option<&ApplicationState> {
        self.applications.get(key)
    }

    /// Spans of one trace in arrival order. Accepts either hex case.
    pub(crate) fn trace_spans(&self, trace_id: &str) -> Option<&VecDeque<Arc<Span>>> {
        self.traces.get(&trace_id.to_ascii_lowercase())
    }

    pub(crate) fn log_property_keys(&self, key: Option<&str>) -> Vec<String> {
        let keys: BTreeSet<&str> = self
            .select(key)
            .flat_map(|state| state.logs.iter())
            .flat_map(|record| record.attributes.keys())
            .collect();
        keys.into_iter().map(str::to_owned).collect()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn application_mut(&mut self, application: &Arc<Application>) -> &mut ApplicationState {
        let limits = &self.limits;
        self.applications
            .entry(application.key.clone())
            .or_insert_with(|| ApplicationState::new(Arc::clone(application), limits))
    }

    fn unindex_span(&mut self, span: &Arc<Span>) {
        if let Some(spans) = self.traces.get_mut(&span.trace_id) {
            // The oldest span of an application is usually the oldest of its
            // trace as well.
            if spans.front().is_some_and(|first| Arc::ptr_eq(first, span)) {
                spans.pop_front();
            } else {
                spans.retain(|candidate| !Arc::ptr_eq(candidate, span));
            }
            if spans.is_empty() {
                self.traces.remove(&span.trace_id);
            }
        }
    }
}

/// Merge entries from several logs back into store-wide arrival order.
pub(crate) fn merge_by_arrival<'a, T: 'a>(
    logs: impl Iterator<Item = &'a BoundedLog<T>>,
) -> Vec<&'a T> {
    let mut entries: Vec<(u64, &T)> = logs.flat_map(BoundedLog::iter_sequenced).collect();
    entries.sort_unstable_by_key(|(seq, _)| *seq);
    entries.into_iter().map(|(_, item)| item).collect()
}
