use serde::Serialize;

use crate::attributes::Attributes;

/// Instrumentation scope (library) that produced a group of entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub name: String,
    pub version: String,
    pub attributes: Attributes,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
