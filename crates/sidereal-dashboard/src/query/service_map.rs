//! Service dependency graph derived from spans.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::model::Span;

/// A directed call relationship between two services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEdge {
    pub source: String,
    pub target: String,
    pub call_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceMap {
    /// Sorted node names: application names and unresolved peer addresses.
    pub nodes: Vec<String>,
    /// Sorted by source then target.
    pub edges: Vec<ServiceEdge>,
}

/// Build the graph from spans grouped by trace.
///
/// A parent span and its child in a different application form one call.
/// Client and producer spans without such a child fall back to their
/// resolved peer address.
pub fn build_service_map<'a, T>(traces: impl Iterator<Item = T>) -> ServiceMap
where
    T: IntoIterator<Item = &'a Arc<Span>> + Copy,
{
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();

    for spans in traces {
        let by_id: HashMap<&str, &Span> = spans
            .into_iter()
            .map(|span| (span.span_id.as_str(), span.as_ref()))
            .collect();
        let mut bridged: HashSet<&str> = HashSet::new();

        for child in spans.into_iter().filter(|span| !span.is_root()) {
            let Some(parent) = by_id.get(child.parent_span_id.as_str()) else {
                continue;
            };
            if parent.application.key != child.application.key {
                bridged.insert(parent.span_id.as_str());
                *counts
                    .entry((parent.application.name.clone(), child.application.name.clone()))
                    .or_default() += 1;
            }
        }

        for span in spans {
            if bridged.contains(span.span_id.as_str()) {
                continue;
            }
            if let Some(peer) = span.peer_address() {
                *counts
                    .entry((span.application.name.clone(), peer))
                    .or_default() += 1;
            }
        }
    }

    let nodes: BTreeSet<String> = counts
        .keys()
        .flat_map(|(source, target)| [source.clone(), target.clone()])
        .collect();

    ServiceMap {
        nodes: nodes.into_iter().collect(),
        edges: counts
            .into_iter()
            .map(|((source, target), call_count)| ServiceEdge {
                source,
                target,
                call_count,
            })
            .collect(),
    }
}
