//! Reporting attributes
//!
//! Per-resource notification attributes (minimum/maximum reporting period,
//! value thresholds). This core stores and validates them; the outer observe
//! engine consumes them for notification scheduling. Writes are
//! all-or-nothing: the first invalid attribute rejects the whole set and the
//! prior table survives unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AccessError, Result};

/// Closed set of reporting-attribute keys
///
/// Only `MaximumPeriod` carries a semantic rule at this layer; the remaining
/// keys pass through untouched for the observe engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    /// pmin — minimum seconds between notifications
    MinimumPeriod,
    /// pmax — maximum seconds between notifications
    MaximumPeriod,
    /// gt — notify when the value crosses above this threshold
    GreaterThan,
    /// lt — notify when the value crosses below this threshold
    LessThan,
    /// st — notify when the value moves by at least this step
    Step,
}

impl std::fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinimumPeriod => write!(f, "pmin"),
            Self::MaximumPeriod => write!(f, "pmax"),
            Self::GreaterThan => write!(f, "gt"),
            Self::LessThan => write!(f, "lt"),
            Self::Step => write!(f, "st"),
        }
    }
}

/// Level an attribute applies at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeScope {
    /// Applies to one resource of the instance
    Resource,
    /// Applies to the whole object instance
    Instance,
}

/// One reporting attribute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: AttributeKey,
    pub value: f64,
    pub scope: AttributeScope,
}

impl Attribute {
    pub fn resource(key: AttributeKey, value: f64) -> Self {
        Self {
            key,
            value,
            scope: AttributeScope::Resource,
        }
    }

    pub fn instance(key: AttributeKey, value: f64) -> Self {
        Self {
            key,
            value,
            scope: AttributeScope::Instance,
        }
    }

    /// The single semantic rule enforced here: a maximum period, if present,
    /// must be strictly positive.
    fn validate(&self) -> std::result::Result<(), String> {
        match self.key {
            AttributeKey::MaximumPeriod if self.value <= 0.0 => Err(format!(
                "maximum period must be > 0, got {}",
                self.value
            )),
            _ => Ok(()),
        }
    }
}

/// The payload of one write-attributes call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    attributes: Vec<Attribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute (builder style).
    pub fn with(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Look up one key within the payload.
    pub fn get(&self, key: AttributeKey) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

/// Applied attributes per resource id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeTable {
    entries: BTreeMap<u16, BTreeMap<AttributeKey, Attribute>>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and apply a whole attribute set for one resource.
    ///
    /// Validation runs over the entire payload before anything is written, so
    /// a rejected call leaves the table untouched. The raw failure detail is
    /// logged and returned as `Internal`, never swallowed.
    pub fn apply(&mut self, resource_id: u16, set: &AttributeSet) -> Result<()> {
        for attribute in set.iter() {
            if let Err(detail) = attribute.validate() {
                log::warn!(
                    "rejecting attribute write on resource {}: {}",
                    resource_id,
                    detail
                );
                return Err(AccessError::internal(detail));
            }
        }
        let entry = self.entries.entry(resource_id).or_default();
        for attribute in set.iter() {
            entry.insert(attribute.key, *attribute);
        }
        Ok(())
    }

    /// Applied attributes for one resource.
    pub fn get(&self, resource_id: u16) -> Option<&BTreeMap<AttributeKey, Attribute>> {
        self.entries.get(&resource_id)
    }

    /// One applied attribute.
    pub fn get_attribute(&self, resource_id: u16, key: AttributeKey) -> Option<&Attribute> {
        self.entries.get(&resource_id).and_then(|m| m.get(&key))
    }
}
