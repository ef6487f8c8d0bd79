//! Events — facts emitted by devices, the input to rule evaluation.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, EventTypeId, StateTypeId};
use crate::params::{Param, ParamValue};
use crate::time::Timestamp;

/// A fact emitted by a device.
///
/// Either plugin-originated (a doorbell press) or synthesized from a state
/// change, in which case `event_type_id` equals the state type's id and the
/// single `value` param carries the new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type_id: EventTypeId,
    pub device_id: DeviceId,
    pub params: Vec<Param>,
    pub is_state_change: bool,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a plugin-originated event stamped with the current time.
    #[must_use]
    pub fn new(event_type_id: EventTypeId, device_id: DeviceId, params: Vec<Param>) -> Self {
        Self {
            event_type_id,
            device_id,
            params,
            is_state_change: false,
            timestamp: crate::time::now(),
        }
    }

    /// Synthesize the event for a state transition.
    #[must_use]
    pub fn state_change(state_type_id: StateTypeId, device_id: DeviceId, value: ParamValue) -> Self {
        Self {
            event_type_id: EventTypeId::from(state_type_id),
            device_id,
            params: vec![Param::new("value", value)],
            is_state_change: true,
            timestamp: crate::time::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_plugin_originated_event() {
        let event = Event::new(EventTypeId::new(), DeviceId::new(), vec![]);
        assert!(!event.is_state_change);
        assert!(event.params.is_empty());
    }

    #[test]
    fn should_synthesize_state_change_event_with_value_param() {
        let state_id = StateTypeId::new();
        let device_id = DeviceId::new();
        let event = Event::state_change(state_id, device_id, ParamValue::Int(21));

        assert!(event.is_state_change);
        assert_eq!(event.event_type_id, EventTypeId::from(state_id));
        assert_eq!(event.device_id, device_id);
        assert_eq!(event.params.len(), 1);
        assert_eq!(event.params[0].name, "value");
        assert_eq!(event.params[0].value, ParamValue::Int(21));
    }

    #[test]
    fn should_roundtrip_event_through_serde_json() {
        let event = Event::state_change(StateTypeId::new(), DeviceId::new(), ParamValue::Bool(true));
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
