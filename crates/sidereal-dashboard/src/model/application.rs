//! Resource identity and the applications derived from it.

use serde::Serialize;

use crate::attributes::Attributes;
use crate::ids::to_shortened_id;

/// Service name used when a resource carries neither a name nor an instance id.
pub const UNKNOWN_SERVICE_NAME: &str = "unknown_service";

/// The identity attributes of a telemetry-emitting process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    pub service_name: Option<String>,
    pub service_instance_id: Option<String>,
    pub attributes: Attributes,
}

impl Resource {
    /// Instance id when present, otherwise the service name.
    pub fn service_id(&self) -> &str {
        self.service_instance_id
            .as_deref()
            .or(self.service_name.as_deref())
            .unwrap_or(UNKNOWN_SERVICE_NAME)
    }
}

/// All telemetry sharing one resource identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    /// Lookup key, see [`Resource::service_id`].
    pub key: String,
    pub name: String,
    pub instance_id: Option<String>,
    /// Resource attributes from the first batch that created the application.
    pub attributes: Attributes,
}

impl Application {
    pub fn from_resource(resource: Resource) -> Self {
        Self {
            key: resource.service_id().to_owned(),
            name: resource
                .service_name
                .unwrap_or_else(|| UNKNOWN_SERVICE_NAME.to_owned()),
            instance_id: resource.service_instance_id,
            attributes: resource.attributes,
        }
    }

    /// Name shown to users; suffixed with the short instance id when that
    /// differs from the name.
    pub fn display_name(&self) -> String {
        match &self.instance_id {
            Some(instance) if *instance != self.name => {
                format!("{}-{}", self.name, to_shortened_id(instance))
            }
            _ => self.name.clone(),
        }
    }
}
