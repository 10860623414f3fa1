//! Object and resource model descriptors
//!
//! An object model is supplied by an external schema provider at instance
//! construction and is fixed for the instance's lifetime: which resource ids
//! exist, their data types, access modes, and multiplicity. Enabler
//! operations consult the model to reject unknown ids and disallowed
//! operations before touching any state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data type of a scalar resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// 64-bit float (e.g. a sensor reading)
    Float,
    /// 64-bit signed integer
    Integer,
    /// Boolean flag
    Boolean,
    /// UTF-8 text (e.g. a units label)
    Text,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Allowed operations on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Read-only
    Read,
    /// Write-only
    Write,
    /// Readable and writable
    ReadWrite,
    /// Executable action; carries no readable value
    Execute,
}

impl AccessMode {
    /// Whether `read` / `observe` are allowed.
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether `write` is allowed.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    /// Whether `execute` is allowed.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Execute)
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "R"),
            Self::Write => write!(f, "W"),
            Self::ReadWrite => write!(f, "RW"),
            Self::Execute => write!(f, "E"),
        }
    }
}

/// Single-valued vs multi-instance resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// One scalar value
    Single,
    /// Ordered map of small integer index to scalar value
    Multiple,
}

/// Descriptor for a single resource id within an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceModel {
    /// Resource id, unique within the object
    pub id: u16,
    /// Human-readable name (e.g. "Sensor Value")
    pub name: String,
    /// Scalar data type
    pub resource_type: ResourceType,
    /// Allowed operations
    pub access: AccessMode,
    /// Single or multi-instance
    pub multiplicity: Multiplicity,
}

impl ResourceModel {
    pub fn new(
        id: u16,
        name: impl Into<String>,
        resource_type: ResourceType,
        access: AccessMode,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            resource_type,
            access,
            multiplicity,
        }
    }

    /// Single-valued resource shorthand.
    pub fn single(
        id: u16,
        name: impl Into<String>,
        resource_type: ResourceType,
        access: AccessMode,
    ) -> Self {
        Self::new(id, name, resource_type, access, Multiplicity::Single)
    }

    /// Executable-action shorthand. Type is nominal; executables hold no value.
    pub fn executable(id: u16, name: impl Into<String>) -> Self {
        Self::new(
            id,
            name,
            ResourceType::Text,
            AccessMode::Execute,
            Multiplicity::Single,
        )
    }
}

/// Descriptor for one object type: the fixed set of valid resource ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    /// Object type id
    pub object_id: u16,
    /// Human-readable object name (e.g. "Temperature")
    pub name: String,
    /// Resource descriptors keyed by resource id
    resources: BTreeMap<u16, ResourceModel>,
}

impl ObjectModel {
    pub fn new(object_id: u16, name: impl Into<String>) -> Self {
        Self {
            object_id,
            name: name.into(),
            resources: BTreeMap::new(),
        }
    }

    /// Add a resource descriptor (builder style).
    pub fn with_resource(mut self, resource: ResourceModel) -> Self {
        self.resources.insert(resource.id, resource);
        self
    }

    /// Look up the descriptor for a resource id.
    pub fn resource(&self, id: u16) -> Option<&ResourceModel> {
        self.resources.get(&id)
    }

    /// Whether the id belongs to the declared supported set.
    pub fn is_supported(&self, id: u16) -> bool {
        self.resources.contains_key(&id)
    }

    /// The fixed supported-id list, ascending.
    pub fn supported_ids(&self) -> Vec<u16> {
        self.resources.keys().copied().collect()
    }

    /// Iterate over all resource descriptors, ascending by id.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceModel> {
        self.resources.values()
    }
}

/// Identity of the caller issuing an operation
///
/// Opaque at this layer: logged for diagnostics, authorized externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requester {
    /// Internal call from the client itself (timers, bootstrap, tests)
    System,
    /// A managing server, identified by its registered name or URI
    Server(String),
}

impl std::fmt::Display for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Server(name) => write!(f, "server:{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature_model() -> ObjectModel {
        ObjectModel::new(3303, "Temperature")
            .with_resource(ResourceModel::single(
                5700,
                "Sensor Value",
                ResourceType::Float,
                AccessMode::Read,
            ))
            .with_resource(ResourceModel::executable(5605, "Reset Min/Max"))
    }

    #[test]
    fn test_access_mode_flags() {
        assert!(AccessMode::Read.is_readable());
        assert!(!AccessMode::Read.is_writable());
        assert!(AccessMode::ReadWrite.is_readable());
        assert!(AccessMode::ReadWrite.is_writable());
        assert!(AccessMode::Write.is_writable());
        assert!(!AccessMode::Write.is_readable());
        assert!(AccessMode::Execute.is_executable());
        assert!(!AccessMode::Execute.is_readable());
    }

    #[test]
    fn test_model_membership() {
        let model = temperature_model();
        assert!(model.is_supported(5700));
        assert!(model.is_supported(5605));
        assert!(!model.is_supported(5601));
        assert_eq!(model.supported_ids(), vec![5605, 5700]);
    }

    #[test]
    fn test_resource_lookup() {
        let model = temperature_model();
        let res = model.resource(5700).unwrap();
        assert_eq!(res.name, "Sensor Value");
        assert_eq!(res.resource_type, ResourceType::Float);
        assert_eq!(res.multiplicity, Multiplicity::Single);
        assert!(model.resource(42).is_none());
    }

    #[test]
    fn test_requester_display() {
        assert_eq!(Requester::System.to_string(), "system");
        assert_eq!(
            Requester::Server("mgmt.example.com".into()).to_string(),
            "server:mgmt.example.com"
        );
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(ResourceType::Float.to_string(), "float");
        assert_eq!(AccessMode::ReadWrite.to_string(), "RW");
    }

    #[test]
    fn test_model_serde_roundtrip() {
        let model = temperature_model();
        let json = serde_json::to_string(&model).unwrap();
        let back: ObjectModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
