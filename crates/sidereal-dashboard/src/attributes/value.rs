//! Typed attribute values decoded from the OTLP `AnyValue` union.

use std::fmt;

use opentelemetry_proto::tonic::common::v1::{any_value::Value as AnyValueKind, AnyValue};

use crate::ids::to_hex;

/// A single attribute value as sent on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    /// Raw bytes, displayed as lowercase hex.
    Bytes(Vec<u8>),
    Array(Vec<AttributeValue>),
    /// Nested key/value list, order preserved.
    Map(Vec<(String, AttributeValue)>),
    /// The sender set the key without a value.
    Empty,
}

impl AttributeValue {
    /// Decode an optional wire value.
    pub fn from_any(value: Option<&AnyValue>) -> Self {
        value.map_or(Self::Empty, Self::from)
    }

    /// Render the value the way the dashboard displays it.
    ///
    /// Numbers use invariant formatting, booleans are `true`/`false`, bytes
    /// are lowercase hex and nested values are compact JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Bool(true) => "true".to_owned(),
            Self::Bool(false) => "false".to_owned(),
            Self::Bytes(b) => to_hex(b),
            Self::Array(_) | Self::Map(_) => self.to_json().to_string(),
            Self::Empty => String::new(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::json!(*i),
            Self::Double(d) => serde_json::json!(*d),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Bytes(b) => serde_json::Value::String(to_hex(b)),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Empty => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&AnyValue> for AttributeValue {
    fn from(value: &AnyValue) -> Self {
        match &value.value {
            Some(AnyValueKind::StringValue(s)) => Self::String(s.clone()),
            Some(AnyValueKind::IntValue(i)) => Self::Int(*i),
            Some(AnyValueKind::DoubleValue(d)) => Self::Double(*d),
            Some(AnyValueKind::BoolValue(b)) => Self::Bool(*b),
            Some(AnyValueKind::BytesValue(b)) => Self::Bytes(b.clone()),
            Some(AnyValueKind::ArrayValue(arr)) => {
                Self::Array(arr.values.iter().map(Self::from).collect())
            }
            Some(AnyValueKind::KvlistValue(kvlist)) => Self::Map(
                kvlist
                    .values
                    .iter()
                    .map(|kv| (kv.key.clone(), Self::from_any(kv.value.as_ref())))
                    .collect(),
            ),
            None => Self::Empty,
        }
    }
}
