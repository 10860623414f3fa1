//! Instance enablers
//!
//! The enabler is the contract an external path router calls into: every
//! read/write/execute/write-attributes/observe lands here, addressed by
//! resource id, and comes back as a typed outcome. Concrete resource sets
//! implement [`InstanceEnabler`] for only the operations they support;
//! unhandled ids fall through to the shared [`fallback`] helpers.
//!
//! [`BaseInstance`] is the store-backed implementation most objects want:
//! one exclusive lock over store + attribute table, model validation before
//! any state is touched, and exactly one coalesced change event per mutating
//! operation.

mod arguments;

pub use arguments::Arguments;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::attributes::{Attribute, AttributeKey, AttributeSet, AttributeTable};
use crate::error::{AccessError, Result};
use crate::model::{Multiplicity, ObjectModel, Requester, ResourceModel};
use crate::notify::{ChangeListener, ChangeNotifier};
use crate::store::ResourceStore;
use crate::value::{round_two_digits, ResourceValue, ScalarValue, WriteMode};

/// Lifecycle hook: instance begins serving. Optional.
pub trait Startable {
    fn start(&self);
}

/// Lifecycle hook: instance pauses background work. Optional.
pub trait Stoppable {
    fn stop(&self);
}

/// Lifecycle hook: synchronous teardown. Mandatory before reclamation; must
/// be idempotent, and by the time it returns no scheduled work may run again.
pub trait Destroyable {
    fn destroy(&self);
}

/// Shared fall-through outcomes for operations an enabler does not handle.
///
/// Each helper returns the error the operation should fail with: NotFound
/// for unknown ids, MethodNotAllowed when the access mode forbids the
/// operation, NotFound otherwise (supported id, nothing served).
pub mod fallback {
    use super::*;

    /// Unhandled read.
    pub fn read(model: &ObjectModel, resource_id: u16) -> AccessError {
        match model.resource(resource_id) {
            None => AccessError::NotFound(resource_id),
            Some(r) if !r.access.is_readable() => AccessError::MethodNotAllowed(resource_id),
            Some(_) => AccessError::NotFound(resource_id),
        }
    }

    /// Unhandled write.
    pub fn write(model: &ObjectModel, resource_id: u16) -> AccessError {
        match model.resource(resource_id) {
            None => AccessError::NotFound(resource_id),
            Some(r) if !r.access.is_writable() => AccessError::MethodNotAllowed(resource_id),
            Some(_) => AccessError::NotFound(resource_id),
        }
    }

    /// Unhandled execute.
    pub fn execute(model: &ObjectModel, resource_id: u16) -> AccessError {
        match model.resource(resource_id) {
            None => AccessError::NotFound(resource_id),
            Some(r) if !r.access.is_executable() => AccessError::MethodNotAllowed(resource_id),
            Some(_) => AccessError::NotFound(resource_id),
        }
    }

    /// Unhandled write-attributes.
    pub fn write_attributes(model: &ObjectModel, resource_id: u16) -> AccessError {
        if !model.is_supported(resource_id) {
            return AccessError::NotFound(resource_id);
        }
        AccessError::internal("write-attributes not supported")
    }
}

/// Contract for managing one object instance
///
/// All operations take the caller identity; it is logged, never authorized
/// here. Default method bodies fall through to [`fallback`].
pub trait InstanceEnabler: Send + Sync {
    /// The fixed model this instance conforms to.
    fn model(&self) -> &ObjectModel;

    /// Instance id within the object.
    fn instance_id(&self) -> u16;

    /// Current value of one resource. Reader-visible floats are rounded to
    /// two decimal places.
    fn read(&self, requester: &Requester, resource_id: u16) -> Result<ResourceValue> {
        let _ = requester;
        Err(fallback::read(self.model(), resource_id))
    }

    /// One index of a multi-instance resource.
    fn read_instance(
        &self,
        requester: &Requester,
        resource_id: u16,
        index: u16,
    ) -> Result<ScalarValue> {
        let _ = (requester, index);
        Err(fallback::read(self.model(), resource_id))
    }

    /// Snapshot of every readable resource.
    fn read_all(&self, requester: &Requester) -> Result<BTreeMap<u16, ResourceValue>> {
        let readable: Vec<u16> = self
            .model()
            .resources()
            .filter(|r| r.access.is_readable())
            .map(|r| r.id)
            .collect();
        let mut out = BTreeMap::new();
        for id in readable {
            if let Ok(value) = self.read(requester, id) {
                out.insert(id, value);
            }
        }
        Ok(out)
    }

    /// Apply a value under the instance lock and report the mutation as one
    /// coalesced change event.
    fn write(
        &self,
        requester: &Requester,
        mode: WriteMode,
        resource_id: u16,
        value: ResourceValue,
    ) -> Result<()> {
        let _ = (requester, mode, value);
        Err(fallback::write(self.model(), resource_id))
    }

    /// Write one index of a multi-instance resource. A missing index is only
    /// created when `add_if_absent` is set.
    fn write_instance(
        &self,
        requester: &Requester,
        add_if_absent: bool,
        resource_id: u16,
        index: u16,
        value: ScalarValue,
    ) -> Result<()> {
        let _ = (requester, add_if_absent, index, value);
        Err(fallback::write(self.model(), resource_id))
    }

    /// Trigger the side-effecting action behind an executable resource.
    fn execute(
        &self,
        requester: &Requester,
        resource_id: u16,
        arguments: &Arguments,
    ) -> Result<()> {
        let _ = (requester, arguments);
        Err(fallback::execute(self.model(), resource_id))
    }

    /// Validate and apply reporting attributes, all-or-nothing.
    fn write_attributes(
        &self,
        requester: &Requester,
        resource_id: u16,
        attributes: &AttributeSet,
    ) -> Result<()> {
        let _ = (requester, attributes);
        Err(fallback::write_attributes(self.model(), resource_id))
    }

    /// Register intent to watch a resource and return its current value.
    /// Mutations are reported to the notifier regardless of observers; the
    /// external observe engine owns delivery and suppression.
    fn observe(&self, requester: &Requester, resource_id: u16) -> Result<ResourceValue> {
        self.read(requester, resource_id)
    }

    /// Observe one index of a multi-instance resource.
    fn observe_instance(
        &self,
        requester: &Requester,
        resource_id: u16,
        index: u16,
    ) -> Result<ScalarValue> {
        self.read_instance(requester, resource_id, index)
    }

    /// The fixed supported-id list for discover. Pure; no lock.
    fn available_resource_ids(&self, model: &ObjectModel) -> Vec<u16> {
        model.supported_ids()
    }
}

/// Instance lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Defaults populated, not yet reachable
    Created,
    /// Serving operations
    Active,
    /// Torn down; unreachable, never emits again
    Destroyed,
}

/// Everything guarded by the instance lock.
struct InstanceState {
    store: ResourceStore,
    attributes: AttributeTable,
    lifecycle: Lifecycle,
}

type ActionFn = Box<dyn Fn(&mut ResourceStore, &Arguments) -> Result<Vec<u16>> + Send + Sync>;

/// Store-backed instance enabler
///
/// Holds the resource store and attribute table behind one exclusive lock;
/// timer-driven and request-driven paths both serialize through it. Change
/// events fire after the lock is released.
pub struct BaseInstance {
    model: ObjectModel,
    instance_id: u16,
    state: Mutex<InstanceState>,
    /// Execute handlers keyed by resource id; fixed after construction.
    actions: BTreeMap<u16, ActionFn>,
    notifier: ChangeNotifier,
}

impl BaseInstance {
    /// New instance in the Created state with an empty store.
    pub fn new(model: ObjectModel, instance_id: u16) -> Self {
        let notifier = ChangeNotifier::new(model.object_id, instance_id);
        Self {
            model,
            instance_id,
            state: Mutex::new(InstanceState {
                store: ResourceStore::new(),
                attributes: AttributeTable::new(),
                lifecycle: Lifecycle::Created,
            }),
            actions: BTreeMap::new(),
            notifier,
        }
    }

    /// Seed a default value (builder style; construction time only).
    pub fn with_default(self, resource_id: u16, value: ResourceValue) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.store.seed(resource_id, value);
        }
        self
    }

    /// Attach an execute handler (builder style). The handler runs under the
    /// instance lock and returns the resource ids it mutated; those are fired
    /// as one coalesced event.
    pub fn with_action(
        mut self,
        resource_id: u16,
        action: impl Fn(&mut ResourceStore, &Arguments) -> Result<Vec<u16>> + Send + Sync + 'static,
    ) -> Self {
        self.actions.insert(resource_id, Box::new(action));
        self
    }

    /// Created → Active. Called by the enclosing container when the instance
    /// becomes reachable.
    pub fn activate(&self) {
        let mut state = self.state.lock().unwrap();
        if state.lifecycle == Lifecycle::Created {
            state.lifecycle = Lifecycle::Active;
            log::info!(
                "activated instance /{}/{}",
                self.model.object_id,
                self.instance_id
            );
        }
    }

    /// Synchronous, idempotent teardown: no further operations mutate state
    /// and no change event is ever emitted again.
    pub fn tear_down(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.lifecycle == Lifecycle::Destroyed {
                return;
            }
            state.lifecycle = Lifecycle::Destroyed;
        }
        self.notifier.shut_down();
        log::info!(
            "destroyed instance /{}/{}",
            self.model.object_id,
            self.instance_id
        );
    }

    /// Internal mutation entry point for timer-driven paths. The closure runs
    /// under the same lock as inbound operations and returns the mutated ids,
    /// which fire as one coalesced event after the lock is released.
    pub fn mutate(&self, f: impl FnOnce(&mut ResourceStore) -> Vec<u16>) -> Result<()> {
        let changed = {
            let mut state = self.state.lock().unwrap();
            Self::guard_active(&state)?;
            f(&mut state.store)
        };
        self.notifier.fire(changed);
        Ok(())
    }

    /// Applied reporting attributes for one resource.
    pub fn attributes(&self, resource_id: u16) -> Option<BTreeMap<AttributeKey, Attribute>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.attributes.get(resource_id).cloned())
    }

    /// Register a change listener. Double-add is a no-op.
    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.notifier.add_listener(listener);
    }

    /// Remove a change listener. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn ChangeListener>) {
        self.notifier.remove_listener(listener);
    }

    /// The instance's change notifier.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn guard_active(state: &InstanceState) -> Result<()> {
        match state.lifecycle {
            Lifecycle::Active => Ok(()),
            Lifecycle::Created => Err(AccessError::internal("instance not active")),
            Lifecycle::Destroyed => Err(AccessError::internal("instance destroyed")),
        }
    }

    fn readable_resource(&self, resource_id: u16) -> Result<&ResourceModel> {
        match self.model.resource(resource_id) {
            None => Err(AccessError::NotFound(resource_id)),
            Some(r) if !r.access.is_readable() => {
                Err(AccessError::MethodNotAllowed(resource_id))
            }
            Some(r) => Ok(r),
        }
    }

    fn writable_resource(&self, resource_id: u16) -> Result<&ResourceModel> {
        match self.model.resource(resource_id) {
            None => Err(AccessError::NotFound(resource_id)),
            Some(r) if !r.access.is_writable() => {
                Err(AccessError::MethodNotAllowed(resource_id))
            }
            Some(r) => Ok(r),
        }
    }
}

/// Reject payloads whose shape or scalar type contradicts the model.
fn check_payload(resource: &ResourceModel, value: &ResourceValue) -> Result<()> {
    match (resource.multiplicity, value) {
        (Multiplicity::Single, ResourceValue::Single(scalar)) => check_scalar(resource, scalar),
        (Multiplicity::Multiple, ResourceValue::Multiple(map)) => {
            map.values().try_for_each(|s| check_scalar(resource, s))
        }
        (Multiplicity::Single, ResourceValue::Multiple(_)) => Err(AccessError::bad_request(
            format!("resource {} is single-valued", resource.id),
        )),
        (Multiplicity::Multiple, ResourceValue::Single(_)) => Err(AccessError::bad_request(
            format!("resource {} is multi-instance", resource.id),
        )),
    }
}

fn check_scalar(resource: &ResourceModel, scalar: &ScalarValue) -> Result<()> {
    if scalar.resource_type() != resource.resource_type {
        return Err(AccessError::bad_request(format!(
            "resource {} expects {}, got {}",
            resource.id,
            resource.resource_type,
            scalar.resource_type()
        )));
    }
    Ok(())
}

/// Copy a value with reader-visible floats rounded to two decimal places.
fn round_floats(value: &ResourceValue) -> ResourceValue {
    let round = |s: &ScalarValue| match s {
        ScalarValue::Float(v) => ScalarValue::Float(round_two_digits(*v)),
        other => other.clone(),
    };
    match value {
        ResourceValue::Single(scalar) => ResourceValue::Single(round(scalar)),
        ResourceValue::Multiple(map) => {
            ResourceValue::Multiple(map.iter().map(|(i, s)| (*i, round(s))).collect())
        }
    }
}

impl InstanceEnabler for BaseInstance {
    fn model(&self) -> &ObjectModel {
        &self.model
    }

    fn instance_id(&self) -> u16 {
        self.instance_id
    }

    fn read(&self, requester: &Requester, resource_id: u16) -> Result<ResourceValue> {
        log::debug!(
            "read /{}/{}/{} by {}",
            self.model.object_id,
            self.instance_id,
            resource_id,
            requester
        );
        self.readable_resource(resource_id)?;
        let state = self.state.lock().unwrap();
        Self::guard_active(&state)?;
        match state.store.get(resource_id) {
            Some(value) => Ok(round_floats(value)),
            None => Err(AccessError::NotFound(resource_id)),
        }
    }

    fn read_instance(
        &self,
        requester: &Requester,
        resource_id: u16,
        index: u16,
    ) -> Result<ScalarValue> {
        log::debug!(
            "read /{}/{}/{}/{} by {}",
            self.model.object_id,
            self.instance_id,
            resource_id,
            index,
            requester
        );
        let resource = self.readable_resource(resource_id)?;
        if resource.multiplicity != Multiplicity::Multiple {
            return Err(AccessError::bad_request(format!(
                "resource {} is single-valued",
                resource_id
            )));
        }
        let state = self.state.lock().unwrap();
        Self::guard_active(&state)?;
        match state.store.get_instance(resource_id, index) {
            Some(ScalarValue::Float(v)) => Ok(ScalarValue::Float(round_two_digits(*v))),
            Some(scalar) => Ok(scalar.clone()),
            None => Err(AccessError::NotFound(resource_id)),
        }
    }

    fn read_all(&self, requester: &Requester) -> Result<BTreeMap<u16, ResourceValue>> {
        log::debug!(
            "read /{}/{} by {}",
            self.model.object_id,
            self.instance_id,
            requester
        );
        // One lock acquisition: the snapshot is never torn across resources.
        let state = self.state.lock().unwrap();
        Self::guard_active(&state)?;
        let mut out = BTreeMap::new();
        for resource in self.model.resources() {
            if resource.access.is_readable() {
                if let Some(value) = state.store.get(resource.id) {
                    out.insert(resource.id, round_floats(value));
                }
            }
        }
        Ok(out)
    }

    fn write(
        &self,
        requester: &Requester,
        mode: WriteMode,
        resource_id: u16,
        value: ResourceValue,
    ) -> Result<()> {
        log::debug!(
            "write ({}) /{}/{}/{} by {}",
            mode,
            self.model.object_id,
            self.instance_id,
            resource_id,
            requester
        );
        let resource = self.writable_resource(resource_id)?;
        check_payload(resource, &value)?;
        {
            let mut state = self.state.lock().unwrap();
            Self::guard_active(&state)?;
            state.store.apply(resource_id, mode, value);
        }
        self.notifier.fire([resource_id]);
        Ok(())
    }

    fn write_instance(
        &self,
        requester: &Requester,
        add_if_absent: bool,
        resource_id: u16,
        index: u16,
        value: ScalarValue,
    ) -> Result<()> {
        log::debug!(
            "write /{}/{}/{}/{} by {}",
            self.model.object_id,
            self.instance_id,
            resource_id,
            index,
            requester
        );
        let resource = self.writable_resource(resource_id)?;
        if resource.multiplicity != Multiplicity::Multiple {
            return Err(AccessError::bad_request(format!(
                "resource {} is single-valued",
                resource_id
            )));
        }
        check_scalar(resource, &value)?;
        {
            let mut state = self.state.lock().unwrap();
            Self::guard_active(&state)?;
            state
                .store
                .apply_instance(resource_id, index, value, add_if_absent)?;
        }
        self.notifier.fire([resource_id]);
        Ok(())
    }

    fn execute(
        &self,
        requester: &Requester,
        resource_id: u16,
        arguments: &Arguments,
    ) -> Result<()> {
        log::info!(
            "execute /{}/{}/{} by {} args [{}]",
            self.model.object_id,
            self.instance_id,
            resource_id,
            requester,
            arguments
        );
        match self.model.resource(resource_id) {
            None => return Err(AccessError::NotFound(resource_id)),
            Some(r) if !r.access.is_executable() => {
                return Err(AccessError::MethodNotAllowed(resource_id))
            }
            Some(_) => {}
        }
        let action = self
            .actions
            .get(&resource_id)
            .ok_or(AccessError::NotFound(resource_id))?;
        let changed = {
            let mut state = self.state.lock().unwrap();
            Self::guard_active(&state)?;
            action(&mut state.store, arguments)?
        };
        self.notifier.fire(changed);
        Ok(())
    }

    fn write_attributes(
        &self,
        requester: &Requester,
        resource_id: u16,
        attributes: &AttributeSet,
    ) -> Result<()> {
        log::info!(
            "write-attributes /{}/{}/{} by {}",
            self.model.object_id,
            self.instance_id,
            resource_id,
            requester
        );
        if !self.model.is_supported(resource_id) {
            return Err(AccessError::NotFound(resource_id));
        }
        let mut state = self.state.lock().unwrap();
        Self::guard_active(&state)?;
        state.attributes.apply(resource_id, attributes)
    }

    fn observe(&self, requester: &Requester, resource_id: u16) -> Result<ResourceValue> {
        log::debug!(
            "observe /{}/{}/{} by {}",
            self.model.object_id,
            self.instance_id,
            resource_id,
            requester
        );
        self.read(requester, resource_id)
    }
}

impl Destroyable for BaseInstance {
    fn destroy(&self) {
        self.tear_down();
    }
}
