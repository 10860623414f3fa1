//! Simulated temperature sensor
//!
//! The reference periodic-mutation fixture: a Temperature object instance
//! whose value takes a random walk on the shared tick scheduler while
//! tracking its observed minimum and maximum. It doubles as the concurrency
//! stress scenario — the timer path and inbound operations serialize through
//! the same instance lock, so readers never see a torn (value, min, max)
//! triple.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use lwm2m_objects::scheduler::TickScheduler;
//! use lwm2m_objects::sensor::{SensorConfig, SimulatedTemperature};
//! use lwm2m_objects::enabler::{InstanceEnabler, Startable};
//! use lwm2m_objects::model::Requester;
//!
//! let scheduler = Arc::new(TickScheduler::new());
//! let sensor = SimulatedTemperature::new(scheduler, 0, &SensorConfig::default());
//! sensor.start();
//! let value = sensor.read(&Requester::System, 5700).unwrap();
//! println!("temperature: {:?}", value);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::attributes::AttributeSet;
use crate::enabler::{
    Arguments, BaseInstance, Destroyable, InstanceEnabler, Startable, Stoppable,
};
use crate::error::Result;
use crate::model::{AccessMode, ObjectModel, Requester, ResourceModel, ResourceType};
use crate::notify::ChangeListener;
use crate::scheduler::{TickHandle, TickScheduler};
use crate::store::ResourceStore;
use crate::value::{ResourceValue, ScalarValue, WriteMode};

/// Temperature object type id
pub const TEMPERATURE_OBJECT_ID: u16 = 3303;
/// Current reading
pub const SENSOR_VALUE: u16 = 5700;
/// Units label
pub const UNITS: u16 = 5701;
/// Lowest reading since power-on or reset
pub const MIN_MEASURED_VALUE: u16 = 5601;
/// Highest reading since power-on or reset
pub const MAX_MEASURED_VALUE: u16 = 5602;
/// Executable: collapse both bounds onto the current reading
pub const RESET_MIN_MAX_MEASURED_VALUES: u16 = 5605;

/// Errors loading a sensor configuration
#[derive(Error, Debug)]
pub enum SensorConfigError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fixture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Milliseconds between mutation ticks
    pub interval_ms: u64,
    /// Reading at power-on; bounds start here too
    pub start_value: f64,
    /// Units label served from resource 5701
    pub units: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            start_value: 20.0,
            units: "cel".into(),
        }
    }
}

impl SensorConfig {
    /// Load from TOML file
    pub fn from_toml_file(path: &str) -> std::result::Result<Self, SensorConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SensorConfigError::Config(format!("Cannot read {}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    /// Parse from TOML string
    pub fn from_toml(content: &str) -> std::result::Result<Self, SensorConfigError> {
        toml::from_str(content)
            .map_err(|e| SensorConfigError::Config(format!("TOML parse error: {}", e)))
    }

    /// Generate sample config
    pub fn sample_toml() -> String {
        r#"# Simulated temperature sensor configuration
interval_ms = 2000
start_value = 20.0
units = "cel"
"#
        .into()
    }

    /// Tick interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// The Temperature object model served by the fixture.
pub fn temperature_model() -> ObjectModel {
    ObjectModel::new(TEMPERATURE_OBJECT_ID, "Temperature")
        .with_resource(ResourceModel::single(
            SENSOR_VALUE,
            "Sensor Value",
            ResourceType::Float,
            AccessMode::Read,
        ))
        .with_resource(ResourceModel::single(
            UNITS,
            "Sensor Units",
            ResourceType::Text,
            AccessMode::Read,
        ))
        .with_resource(ResourceModel::single(
            MIN_MEASURED_VALUE,
            "Min Measured Value",
            ResourceType::Float,
            AccessMode::Read,
        ))
        .with_resource(ResourceModel::single(
            MAX_MEASURED_VALUE,
            "Max Measured Value",
            ResourceType::Float,
            AccessMode::Read,
        ))
        .with_resource(ResourceModel::executable(
            RESET_MIN_MAX_MEASURED_VALUES,
            "Reset Min and Max Measured Values",
        ))
}

fn float_of(store: &ResourceStore, id: u16) -> Option<f64> {
    store
        .get(id)
        .and_then(ResourceValue::as_single)
        .and_then(ScalarValue::as_f64)
}

/// Apply one mutation step under the instance lock.
///
/// At most one bound can move per step: with min <= current <= max
/// beforehand, a single additive delta cannot both exceed the max and fall
/// below the min, so the two branches are mutually exclusive by construction.
/// The mutated ids come back as one coalesced change event.
fn apply_delta(instance: &BaseInstance, delta: f64) -> Result<()> {
    instance.mutate(|store| {
        let Some(current) = float_of(store, SENSOR_VALUE) else {
            return Vec::new();
        };
        let next = current + delta;
        store.apply(SENSOR_VALUE, WriteMode::Replace, ResourceValue::float(next));
        let mut changed = vec![SENSOR_VALUE];

        let max = float_of(store, MAX_MEASURED_VALUE).unwrap_or(next);
        let min = float_of(store, MIN_MEASURED_VALUE).unwrap_or(next);
        if next > max {
            store.apply(
                MAX_MEASURED_VALUE,
                WriteMode::Replace,
                ResourceValue::float(next),
            );
            changed.push(MAX_MEASURED_VALUE);
        } else if next < min {
            store.apply(
                MIN_MEASURED_VALUE,
                WriteMode::Replace,
                ResourceValue::float(next),
            );
            changed.push(MIN_MEASURED_VALUE);
        }
        changed
    })
}

/// Simulated temperature sensor instance
///
/// Construction populates defaults (Created); `start` activates the instance
/// and registers the periodic task; `destroy` cancels it synchronously —
/// once it returns no further tick runs and no change event is ever emitted
/// again.
pub struct SimulatedTemperature {
    instance: Arc<BaseInstance>,
    scheduler: Arc<TickScheduler>,
    interval: Duration,
    handle: Mutex<Option<TickHandle>>,
}

impl SimulatedTemperature {
    pub fn new(scheduler: Arc<TickScheduler>, instance_id: u16, config: &SensorConfig) -> Self {
        let instance = Arc::new(
            BaseInstance::new(temperature_model(), instance_id)
                .with_default(SENSOR_VALUE, ResourceValue::float(config.start_value))
                .with_default(MIN_MEASURED_VALUE, ResourceValue::float(config.start_value))
                .with_default(MAX_MEASURED_VALUE, ResourceValue::float(config.start_value))
                .with_default(UNITS, ResourceValue::text(config.units.clone()))
                .with_action(RESET_MIN_MAX_MEASURED_VALUES, |store, _args| {
                    let Some(current) = float_of(store, SENSOR_VALUE) else {
                        return Ok(Vec::new());
                    };
                    store.apply(
                        MIN_MEASURED_VALUE,
                        WriteMode::Replace,
                        ResourceValue::float(current),
                    );
                    store.apply(
                        MAX_MEASURED_VALUE,
                        WriteMode::Replace,
                        ResourceValue::float(current),
                    );
                    Ok(vec![MIN_MEASURED_VALUE, MAX_MEASURED_VALUE])
                }),
        );
        Self {
            instance,
            scheduler,
            interval: config.interval(),
            handle: Mutex::new(None),
        }
    }

    /// Register a change listener on the underlying instance.
    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.instance.add_listener(listener);
    }

    /// Remove a change listener.
    pub fn remove_listener(&self, listener: &Arc<dyn ChangeListener>) {
        self.instance.remove_listener(listener);
    }

    /// Step the walk once, as the timer does. Exposed for deterministic
    /// exercises; production mutation comes from the scheduled task.
    pub fn step(&self, delta: f64) -> Result<()> {
        apply_delta(&self.instance, delta)
    }
}

impl Startable for SimulatedTemperature {
    /// Activate the instance and begin periodic mutation.
    fn start(&self) {
        self.instance.activate();
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            return;
        }
        let instance = self.instance.clone();
        *handle = Some(self.scheduler.schedule(
            "temperature-sensor",
            self.interval,
            move || {
                // Uniform over {-1.0, -0.9, ..., +0.9}.
                let step: i32 = rand::thread_rng().gen_range(0..20);
                let delta = (step - 10) as f64 / 10.0;
                if let Err(err) = apply_delta(&instance, delta) {
                    log::error!("temperature tick failed: {}", err);
                }
            },
        ));
    }
}

impl Stoppable for SimulatedTemperature {
    /// Pause periodic mutation. Blocks until any in-flight tick completes.
    fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.cancel();
        }
    }
}

impl Destroyable for SimulatedTemperature {
    /// Synchronous teardown: cancel the scheduled task, then silence the
    /// instance for good. Idempotent.
    fn destroy(&self) {
        self.stop();
        self.instance.tear_down();
    }
}

impl Drop for SimulatedTemperature {
    fn drop(&mut self) {
        // The container is expected to destroy first; this keeps a leaked
        // fixture from ticking forever.
        self.stop();
    }
}

impl InstanceEnabler for SimulatedTemperature {
    fn model(&self) -> &ObjectModel {
        self.instance.model()
    }

    fn instance_id(&self) -> u16 {
        self.instance.instance_id()
    }

    fn read(&self, requester: &Requester, resource_id: u16) -> Result<ResourceValue> {
        self.instance.read(requester, resource_id)
    }

    fn read_instance(
        &self,
        requester: &Requester,
        resource_id: u16,
        index: u16,
    ) -> Result<ScalarValue> {
        self.instance.read_instance(requester, resource_id, index)
    }

    fn read_all(&self, requester: &Requester) -> Result<BTreeMap<u16, ResourceValue>> {
        self.instance.read_all(requester)
    }

    fn write(
        &self,
        requester: &Requester,
        mode: WriteMode,
        resource_id: u16,
        value: ResourceValue,
    ) -> Result<()> {
        self.instance.write(requester, mode, resource_id, value)
    }

    fn write_instance(
        &self,
        requester: &Requester,
        add_if_absent: bool,
        resource_id: u16,
        index: u16,
        value: ScalarValue,
    ) -> Result<()> {
        self.instance
            .write_instance(requester, add_if_absent, resource_id, index, value)
    }

    fn execute(
        &self,
        requester: &Requester,
        resource_id: u16,
        arguments: &Arguments,
    ) -> Result<()> {
        self.instance.execute(requester, resource_id, arguments)
    }

    fn write_attributes(
        &self,
        requester: &Requester,
        resource_id: u16,
        attributes: &AttributeSet,
    ) -> Result<()> {
        self.instance
            .write_attributes(requester, resource_id, attributes)
    }

    fn observe(&self, requester: &Requester, resource_id: u16) -> Result<ResourceValue> {
        self.instance.observe(requester, resource_id)
    }
}
