//! Bounded attribute sets.
//!
//! Wire attributes are copied into an ordered list of display strings. The
//! copy reads at most `attribute_count_limit` raw pairs, so pairs beyond the
//! limit are dropped before any filter runs, and each value is cut to
//! `attribute_length_limit` characters. Truncation is silent.

mod peer;
mod value;

use opentelemetry_proto::tonic::common::v1::KeyValue;
use serde::Serialize;

pub use peer::resolve_peer_address;
pub use value::AttributeValue;

use crate::config::TelemetryLimits;
use crate::ids::truncate_str;

/// Count and length bounds applied when copying attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLimits {
    /// Maximum raw pairs read from the wire.
    pub count: usize,
    /// Maximum characters kept per value.
    pub length: usize,
}

impl AttributeLimits {
    /// Limits that keep everything.
    pub const UNBOUNDED: Self = Self {
        count: usize::MAX,
        length: usize::MAX,
    };
}

impl From<&TelemetryLimits> for AttributeLimits {
    fn from(limits: &TelemetryLimits) -> Self {
        Self {
            count: limits.attribute_count_limit,
            length: limits.attribute_length_limit,
        }
    }
}

/// An ordered list of `(key, value)` pairs.
///
/// Keys are not deduplicated; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// An empty set.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Value of the first pair with `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any pair has `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Whether any pair has exactly this key and value.
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.0.iter().any(|(k, v)| k == key && v == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    /// Render as `k: v, k2: ''` for single-line display.
    pub fn concat_properties(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    format!("{k}: ''")
                } else {
                    format!("{k}: {v}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The outgoing peer these attributes describe, if any.
    pub fn peer_address(&self) -> Option<String> {
        resolve_peer_address(self)
    }
}

impl From<Vec<(String, String)>> for Attributes {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Copy wire attributes into a bounded set.
pub fn encode_attributes(attributes: &[KeyValue], limits: AttributeLimits) -> Attributes {
    encode_attributes_filtered(attributes, limits, |_| true)
}

/// Copy wire attributes into a bounded set, keeping only pairs accepted by
/// `filter`.
///
/// The count limit applies to the raw input, not to the filtered output.
pub fn encode_attributes_filtered<F>(
    attributes: &[KeyValue],
    limits: AttributeLimits,
    filter: F,
) -> Attributes
where
    F: Fn(&KeyValue) -> bool,
{
    let mut pairs = Vec::new();
    copy_into(attributes, limits, filter, &mut pairs);
    Attributes(pairs)
}

/// Reusable scratch space for repeated attribute copies.
///
/// Keeps its allocation between calls. Results are identical to
/// [`encode_attributes`].
#[derive(Debug, Default)]
pub struct AttributeBuffer {
    pairs: Vec<(String, String)>,
}

impl AttributeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer contents with a bounded copy of `attributes`.
    pub fn encode(&mut self, attributes: &[KeyValue], limits: AttributeLimits) -> &[(String, String)] {
        self.pairs.clear();
        copy_into(attributes, limits, |_| true, &mut self.pairs);
        &self.pairs
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Whether the buffer holds exactly the pairs in `attributes`.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.pairs == attributes.0
    }

    /// Clone the current contents into an owned set.
    pub fn to_attributes(&self) -> Attributes {
        Attributes(self.pairs.clone())
    }

    pub fn capacity(&self) -> usize {
        self.pairs.capacity()
    }
}

fn copy_into<F>(
    attributes: &[KeyValue],
    limits: AttributeLimits,
    filter: F,
    out: &mut Vec<(String, String)>,
) where
    F: Fn(&KeyValue) -> bool,
{
    let read_count = attributes.len().min(limits.count);
    out.reserve(read_count);

    for kv in attributes[..read_count].iter().filter(|kv| filter(kv)) {
        let value = AttributeValue::from_any(kv.value.as_ref()).to_display_string();
        out.push((kv.key.clone(), truncate_owned(value, limits.length)));
    }
}

fn truncate_owned(mut value: String, max_chars: usize) -> String {
    let kept = truncate_str(&value, max_chars).len();
    value.truncate(kept);
    value
}
