//! Typed identifier newtypes backed by UUIDs.
//!
//! Every identifier kind in the system gets its own newtype so that, say, a
//! [`DeviceId`] can never be passed where a [`DeviceClassId`] is expected,
//! even though both are UUIDs on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub const fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a loaded device plugin.
    PluginId
);

define_id!(
    /// Unique identifier for a [`Vendor`](crate::device_class::Vendor).
    VendorId
);

define_id!(
    /// Unique identifier for a [`DeviceClass`](crate::device_class::DeviceClass).
    DeviceClassId
);

define_id!(
    /// Unique identifier for a configured [`Device`](crate::device::Device).
    DeviceId
);

define_id!(
    /// Unique identifier for a [`DeviceDescriptor`](crate::device::DeviceDescriptor)
    /// produced by discovery.
    DeviceDescriptorId
);

define_id!(
    /// Unique identifier for a [`ParamType`](crate::params::ParamType).
    ParamTypeId
);

define_id!(
    /// Unique identifier for an [`ActionType`](crate::device_class::ActionType).
    ActionTypeId
);

define_id!(
    /// Unique identifier for a [`StateType`](crate::device_class::StateType).
    StateTypeId
);

define_id!(
    /// Unique identifier for an [`EventType`](crate::device_class::EventType).
    EventTypeId
);

define_id!(
    /// Unique identifier for a multi-step pairing handshake.
    PairingTransactionId
);

define_id!(
    /// Unique identifier for a single [`Action`](crate::action::Action)
    /// execution.
    ActionId
);

/// Every state type implicitly defines an event type of identical ID
/// (the state-change event), so this conversion is the one sanctioned
/// crossing between identifier kinds.
impl From<StateTypeId> for EventTypeId {
    fn from(id: StateTypeId) -> Self {
        Self(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = DeviceId::new();
        let b = DeviceId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = DeviceClassId::new();
        let text = id.to_string();
        let parsed: DeviceClassId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let id = PluginId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: PluginId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        let result = VendorId::from_str("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn should_wrap_existing_uuid_when_using_from_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = PairingTransactionId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn should_convert_state_type_id_to_event_type_id_preserving_uuid() {
        let state_id = StateTypeId::new();
        let event_id = EventTypeId::from(state_id);
        assert_eq!(event_id.as_uuid(), state_id.as_uuid());
    }
}
