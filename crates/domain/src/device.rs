//! Devices — configured instances of a device class — and the ephemeral
//! descriptors discovery produces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::device_class::DeviceClass;
use crate::id::{DeviceClassId, DeviceDescriptorId, DeviceId, PluginId, StateTypeId};
use crate::params::{Param, ParamValue};

/// A configured, persisted device instance.
///
/// Owned exclusively by the device manager; plugins only ever see borrows
/// during manager-sanctioned calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub device_class_id: DeviceClassId,
    pub plugin_id: PluginId,
    pub name: String,
    pub params: Vec<Param>,
    pub states: HashMap<StateTypeId, ParamValue>,
    pub setup_complete: bool,
}

impl Device {
    /// Create a device with no params and no states yet.
    #[must_use]
    pub fn new(
        id: DeviceId,
        device_class_id: DeviceClassId,
        plugin_id: PluginId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            device_class_id,
            plugin_id,
            name: name.into(),
            params: Vec::new(),
            states: HashMap::new(),
            setup_complete: false,
        }
    }

    /// Initialize the state map from the class's declared defaults.
    ///
    /// Existing values are discarded; this runs once at setup time.
    pub fn init_states(&mut self, class: &DeviceClass) {
        self.states = class
            .state_types
            .iter()
            .map(|t| (t.id, t.default_value.clone()))
            .collect();
    }

    /// The current value of a state, if the device carries it.
    #[must_use]
    pub fn state_value(&self, state_type_id: StateTypeId) -> Option<&ParamValue> {
        self.states.get(&state_type_id)
    }

    /// Store a new state value. Returns `false` when the device does not
    /// carry the state.
    pub fn set_state_value(&mut self, state_type_id: StateTypeId, value: ParamValue) -> bool {
        match self.states.get_mut(&state_type_id) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Look up a setup param value by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        crate::params::param_value(&self.params, name)
    }
}

/// An ephemeral discovery candidate — not yet a device.
///
/// Inserted when the owning plugin reports discovery; consumed by adding
/// the device or starting a pairing; evicted by the next discovery cycle
/// for the same class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: DeviceDescriptorId,
    pub title: String,
    pub description: String,
    pub params: Vec<Param>,
}

impl DeviceDescriptor {
    /// Create a descriptor with a fresh identifier.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: DeviceDescriptorId::new(),
            title: title.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }
}
