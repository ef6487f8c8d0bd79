//! Device classes — the type descriptions plugins publish.
//!
//! A device class declares how instances of it are created and set up, what
//! parameters they take, and which states, actions, and events they expose.

use serde::{Deserialize, Serialize};

use crate::id::{ActionTypeId, DeviceClassId, EventTypeId, PluginId, StateTypeId, VendorId};
use crate::params::{ParamKind, ParamType, ParamValue};

/// A device vendor, as declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
}

impl Vendor {
    #[must_use]
    pub fn new(id: VendorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A typed value slot on a device, e.g. `power` or `temperature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateType {
    pub id: StateTypeId,
    pub name: String,
    pub default_value: ParamValue,
}

impl StateType {
    #[must_use]
    pub fn new(id: StateTypeId, name: impl Into<String>, default_value: ParamValue) -> Self {
        Self {
            id,
            name: name.into(),
            default_value,
        }
    }
}

/// An imperative request a device understands, e.g. `set-power`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionType {
    pub id: ActionTypeId,
    pub name: String,
    pub param_types: Vec<ParamType>,
}

impl ActionType {
    #[must_use]
    pub fn new(id: ActionTypeId, name: impl Into<String>, param_types: Vec<ParamType>) -> Self {
        Self {
            id,
            name: name.into(),
            param_types,
        }
    }
}

/// A fact a device can emit, e.g. `button-pressed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventType {
    pub id: EventTypeId,
    pub name: String,
    pub param_types: Vec<ParamType>,
}

impl EventType {
    #[must_use]
    pub fn new(id: EventTypeId, name: impl Into<String>, param_types: Vec<ParamType>) -> Self {
        Self {
            id,
            name: name.into(),
            param_types,
        }
    }
}

/// How instances of a device class come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMethod {
    /// Created by the user supplying parameters directly.
    User,
    /// Created from a descriptor produced by discovery.
    Discovery,
    /// Created by the plugin without user consent.
    Auto,
}

const ALL_CREATE_METHODS: [CreateMethod; 3] = [
    CreateMethod::User,
    CreateMethod::Discovery,
    CreateMethod::Auto,
];

/// A typed set of [`CreateMethod`]s.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(from = "Vec<CreateMethod>", into = "Vec<CreateMethod>")]
pub struct CreateMethods(u8);

impl CreateMethods {
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, method: CreateMethod) -> Self {
        Self(self.0 | 1 << method as u8)
    }

    #[must_use]
    pub const fn contains(self, method: CreateMethod) -> bool {
        self.0 & 1 << method as u8 != 0
    }
}

impl From<Vec<CreateMethod>> for CreateMethods {
    fn from(methods: Vec<CreateMethod>) -> Self {
        methods.into_iter().fold(Self::none(), Self::with)
    }
}

impl From<CreateMethods> for Vec<CreateMethod> {
    fn from(set: CreateMethods) -> Self {
        ALL_CREATE_METHODS
            .into_iter()
            .filter(|m| set.contains(*m))
            .collect()
    }
}

/// The handshake required to set an instance up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupMethod {
    /// No handshake; parameters are enough.
    JustAdd,
    /// The device displays a pin the user must enter.
    DisplayPin,
    /// The user enters a pin printed on the device.
    EnterPin,
    /// The user presses a physical button during pairing.
    PushButton,
}

/// The type description a plugin publishes; produces device instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceClass {
    pub id: DeviceClassId,
    pub vendor_id: VendorId,
    pub plugin_id: PluginId,
    pub name: String,
    pub create_methods: CreateMethods,
    pub setup_method: SetupMethod,
    /// Setup parameters, persisted in their verified form.
    pub param_types: Vec<ParamType>,
    /// Parameters for a discovery run.
    pub discovery_param_types: Vec<ParamType>,
    pub state_types: Vec<StateType>,
    pub action_types: Vec<ActionType>,
    pub event_types: Vec<EventType>,
}

impl DeviceClass {
    /// Create a builder for constructing a [`DeviceClass`].
    #[must_use]
    pub fn builder(id: DeviceClassId, vendor_id: VendorId, plugin_id: PluginId) -> DeviceClassBuilder {
        DeviceClassBuilder {
            id,
            vendor_id,
            plugin_id,
            name: String::new(),
            create_methods: CreateMethods::none(),
            setup_method: SetupMethod::JustAdd,
            param_types: Vec::new(),
            discovery_param_types: Vec::new(),
            state_types: Vec::new(),
            action_types: Vec::new(),
            event_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn action_type(&self, id: ActionTypeId) -> Option<&ActionType> {
        self.action_types.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn state_type(&self, id: StateTypeId) -> Option<&StateType> {
        self.state_types.iter().find(|t| t.id == id)
    }

    /// All event types of this class: the declared ones plus, for every
    /// state type, the synthesized state-change event of identical ID
    /// carrying a single `value` param.
    #[must_use]
    pub fn all_event_types(&self) -> Vec<EventType> {
        let mut types = self.event_types.clone();
        for state_type in &self.state_types {
            types.push(EventType::new(
                EventTypeId::from(state_type.id),
                state_type.name.clone(),
                vec![ParamType::new("value", ParamKind::Variant)],
            ));
        }
        types
    }

    /// Whether the given event type is declared or state-synthesized here.
    #[must_use]
    pub fn has_event_type(&self, id: EventTypeId) -> bool {
        self.event_types.iter().any(|t| t.id == id)
            || self
                .state_types
                .iter()
                .any(|t| EventTypeId::from(t.id) == id)
    }
}

/// Step-by-step builder for [`DeviceClass`].
#[derive(Debug)]
pub struct DeviceClassBuilder {
    id: DeviceClassId,
    vendor_id: VendorId,
    plugin_id: PluginId,
    name: String,
    create_methods: CreateMethods,
    setup_method: SetupMethod,
    param_types: Vec<ParamType>,
    discovery_param_types: Vec<ParamType>,
    state_types: Vec<StateType>,
    action_types: Vec<ActionType>,
    event_types: Vec<EventType>,
}

impl DeviceClassBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn create_method(mut self, method: CreateMethod) -> Self {
        self.create_methods = self.create_methods.with(method);
        self
    }

    #[must_use]
    pub fn setup_method(mut self, method: SetupMethod) -> Self {
        self.setup_method = method;
        self
    }

    #[must_use]
    pub fn param_type(mut self, param_type: ParamType) -> Self {
        self.param_types.push(param_type);
        self
    }

    #[must_use]
    pub fn discovery_param_type(mut self, param_type: ParamType) -> Self {
        self.discovery_param_types.push(param_type);
        self
    }

    #[must_use]
    pub fn state_type(mut self, state_type: StateType) -> Self {
        self.state_types.push(state_type);
        self
    }

    #[must_use]
    pub fn action_type(mut self, action_type: ActionType) -> Self {
        self.action_types.push(action_type);
        self
    }

    #[must_use]
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_types.push(event_type);
        self
    }

    /// Consume the builder and return the [`DeviceClass`].
    #[must_use]
    pub fn build(self) -> DeviceClass {
        DeviceClass {
            id: self.id,
            vendor_id: self.vendor_id,
            plugin_id: self.plugin_id,
            name: self.name,
            create_methods: self.create_methods,
            setup_method: self.setup_method,
            param_types: self.param_types,
            discovery_param_types: self.discovery_param_types,
            state_types: self.state_types,
            action_types: self.action_types,
            event_types: self.event_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_class() -> DeviceClass {
        DeviceClass::builder(DeviceClassId::new(), VendorId::new(), PluginId::new())
            .name("Light")
            .create_method(CreateMethod::User)
            .setup_method(SetupMethod::JustAdd)
            .state_type(StateType::new(
                StateTypeId::new(),
                "power",
                ParamValue::Bool(false),
            ))
            .action_type(ActionType::new(ActionTypeId::new(), "set-power", vec![]))
            .build()
    }

    #[test]
    fn should_build_class_with_declared_members() {
        let class = light_class();
        assert_eq!(class.name, "Light");
        assert!(class.create_methods.contains(CreateMethod::User));
        assert!(!class.create_methods.contains(CreateMethod::Discovery));
        assert_eq!(class.setup_method, SetupMethod::JustAdd);
        assert_eq!(class.state_types.len(), 1);
        assert_eq!(class.action_types.len(), 1);
    }

    #[test]
    fn should_find_action_type_by_id() {
        let class = light_class();
        let id = class.action_types[0].id;
        assert!(class.action_type(id).is_some());
        assert!(class.action_type(ActionTypeId::new()).is_none());
    }

    #[test]
    fn should_synthesize_event_type_for_each_state_type() {
        let class = light_class();
        let state_id = class.state_types[0].id;

        let event_types = class.all_event_types();
        assert_eq!(event_types.len(), 1);
        assert_eq!(event_types[0].id, EventTypeId::from(state_id));
        assert_eq!(event_types[0].param_types.len(), 1);
        assert_eq!(event_types[0].param_types[0].name, "value");

        assert!(class.has_event_type(EventTypeId::from(state_id)));
        assert!(!class.has_event_type(EventTypeId::new()));
    }

    #[test]
    fn should_keep_declared_event_types_alongside_synthesized_ones() {
        let declared = EventType::new(EventTypeId::new(), "button-pressed", vec![]);
        let class = DeviceClass::builder(DeviceClassId::new(), VendorId::new(), PluginId::new())
            .name("Remote")
            .create_method(CreateMethod::Discovery)
            .event_type(declared.clone())
            .state_type(StateType::new(
                StateTypeId::new(),
                "battery",
                ParamValue::Uint(100),
            ))
            .build();

        let event_types = class.all_event_types();
        assert_eq!(event_types.len(), 2);
        assert!(class.has_event_type(declared.id));
    }

    #[test]
    fn should_roundtrip_create_methods_through_serde_json() {
        let set = CreateMethods::none()
            .with(CreateMethod::User)
            .with(CreateMethod::Auto);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[\"user\",\"auto\"]");
        let parsed: CreateMethods = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn should_roundtrip_device_class_through_serde_json() {
        let class = light_class();
        let json = serde_json::to_string(&class).unwrap();
        let parsed: DeviceClass = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, class);
    }
}
