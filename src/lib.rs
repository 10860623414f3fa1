//! Per-instance LwM2M object enablers for device-management clients
//!
//! This crate is the layer between a client's wire transport and its actual
//! device data: typed, addressable resources grouped into object instances,
//! with coalesced change notification toward an external observe engine.
//!
//! - [`model`] — object/resource descriptors supplied at construction
//! - [`value`] — scalar and multi-instance resource values, write modes
//! - [`store`] — the in-memory resource store (Replace/Update semantics)
//! - [`attributes`] — reporting attributes, validated all-or-nothing
//! - [`notify`] — change events and listener registry
//! - [`enabler`] — the operation contract, fallbacks, and the store-backed
//!   [`enabler::BaseInstance`]
//! - [`scheduler`] — shared tick scheduler with cancellable handles
//! - [`sensor`] — the simulated temperature sensor fixture
//!
//! The transport, protocol state machine, schema loader, and observe/notify
//! delivery are external collaborators; no wire format is defined here and
//! nothing is persisted across restarts.

pub mod attributes;
pub mod enabler;
pub mod error;
pub mod model;
pub mod notify;
pub mod scheduler;
pub mod sensor;
pub mod store;
pub mod value;

// Re-export commonly used types at the crate root for convenience
pub use attributes::{Attribute, AttributeKey, AttributeScope, AttributeSet, AttributeTable};
pub use enabler::{
    Arguments, BaseInstance, Destroyable, InstanceEnabler, Startable, Stoppable,
};
pub use error::{AccessError, Result};
pub use model::{
    AccessMode, Multiplicity, ObjectModel, Requester, ResourceModel, ResourceType,
};
pub use notify::{ChangeEvent, ChangeListener, ChangeNotifier};
pub use scheduler::{TickHandle, TickScheduler};
pub use store::ResourceStore;
pub use value::{round_two_digits, ResourceValue, ScalarValue, WriteMode};
