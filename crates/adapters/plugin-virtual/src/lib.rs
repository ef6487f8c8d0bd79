//! # hearth-plugin-virtual
//!
//! Simulated plugin providing virtual devices for testing and
//! demonstration purposes.
//!
//! ## Provided device classes
//!
//! | Class | Created via | Setup | Behaviour |
//! |-------|-------------|-------|-----------|
//! | Virtual Lamp | user parameters | just add | power/brightness states driven by actions; uptime counts timer ticks |
//! | Virtual Socket | discovery | push button | two discoverable sockets; pairing confirms asynchronously |
//!
//! ## Dependency rule
//!
//! Depends on `hearth-core` (port traits) and `hearth-domain` only.

use std::collections::HashMap;

use uuid::Uuid;

use hearth_core::ports::plugin::{DevicePlugin, PluginEmitter};
use hearth_core::ports::provider::{PluginPackage, PluginProvider};
use hearth_domain::action::Action;
use hearth_domain::device::{Device, DeviceDescriptor};
use hearth_domain::device_class::{
    ActionType, CreateMethod, DeviceClass, SetupMethod, StateType, Vendor,
};
use hearth_domain::error::{Completion, DeviceError, SetupStatus};
use hearth_domain::hardware::{HardwareResource, HardwareResources};
use hearth_domain::id::{
    ActionTypeId, DeviceClassId, DeviceId, PairingTransactionId, PluginId, StateTypeId, VendorId,
};
use hearth_domain::params::{param_value, Param, ParamKind, ParamType, ParamValue};

pub const PLUGIN_ID: PluginId =
    PluginId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334401));
pub const VENDOR_ID: VendorId =
    VendorId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334402));

pub const LAMP_CLASS_ID: DeviceClassId =
    DeviceClassId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334410));
pub const LAMP_POWER_STATE_ID: StateTypeId =
    StateTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334411));
pub const LAMP_BRIGHTNESS_STATE_ID: StateTypeId =
    StateTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334412));
pub const LAMP_UPTIME_STATE_ID: StateTypeId =
    StateTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334413));
pub const LAMP_SET_POWER_ACTION_ID: ActionTypeId =
    ActionTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334414));
pub const LAMP_SET_BRIGHTNESS_ACTION_ID: ActionTypeId =
    ActionTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334415));

pub const SOCKET_CLASS_ID: DeviceClassId =
    DeviceClassId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334420));
pub const SOCKET_POWER_STATE_ID: StateTypeId =
    StateTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334421));
pub const SOCKET_SET_POWER_ACTION_ID: ActionTypeId =
    ActionTypeId::from_uuid(Uuid::from_u128(0x7063_4b4c_9f1e_4bd0_a3f2_001122334422));

/// Simulated plugin backing the virtual device classes.
pub struct VirtualPlugin {
    emitter: Option<PluginEmitter>,
    /// Devices this plugin has set up, with their class.
    devices: HashMap<DeviceId, DeviceClassId>,
    uptime: HashMap<DeviceId, u64>,
}

impl Default for VirtualPlugin {
    fn default() -> Self {
        Self {
            emitter: None,
            devices: HashMap::new(),
            uptime: HashMap::new(),
        }
    }
}

impl VirtualPlugin {
    fn lamp_class() -> DeviceClass {
        DeviceClass::builder(LAMP_CLASS_ID, VENDOR_ID, PLUGIN_ID)
            .name("Virtual Lamp")
            .create_method(CreateMethod::User)
            .setup_method(SetupMethod::JustAdd)
            .param_type(ParamType::new("host", ParamKind::String))
            .param_type(ParamType::new("port", ParamKind::Int).default_value(ParamValue::Int(8080)))
            .state_type(StateType::new(LAMP_POWER_STATE_ID, "power", ParamValue::Bool(false)))
            .state_type(StateType::new(
                LAMP_BRIGHTNESS_STATE_ID,
                "brightness",
                ParamValue::Uint(100),
            ))
            .state_type(StateType::new(LAMP_UPTIME_STATE_ID, "uptime", ParamValue::Uint(0)))
            .action_type(ActionType::new(
                LAMP_SET_POWER_ACTION_ID,
                "set-power",
                vec![ParamType::new("power", ParamKind::Bool)],
            ))
            .action_type(ActionType::new(
                LAMP_SET_BRIGHTNESS_ACTION_ID,
                "set-brightness",
                vec![ParamType::new("brightness", ParamKind::Uint)
                    .min_value(ParamValue::Uint(0))
                    .max_value(ParamValue::Uint(100))],
            ))
            .build()
    }

    fn socket_class() -> DeviceClass {
        DeviceClass::builder(SOCKET_CLASS_ID, VENDOR_ID, PLUGIN_ID)
            .name("Virtual Socket")
            .create_method(CreateMethod::Discovery)
            .setup_method(SetupMethod::PushButton)
            .param_type(ParamType::new("number", ParamKind::Uint))
            .state_type(StateType::new(SOCKET_POWER_STATE_ID, "power", ParamValue::Bool(false)))
            .action_type(ActionType::new(
                SOCKET_SET_POWER_ACTION_ID,
                "set-power",
                vec![ParamType::new("power", ParamKind::Bool)],
            ))
            .build()
    }

    fn emit_state(&self, device_id: DeviceId, state_type_id: StateTypeId, value: ParamValue) {
        if let Some(emitter) = &self.emitter {
            emitter.state_value_changed(device_id, state_type_id, value);
        }
    }
}

impl DevicePlugin for VirtualPlugin {
    fn plugin_id(&self) -> PluginId {
        PLUGIN_ID
    }

    fn plugin_name(&self) -> &str {
        "virtual"
    }

    fn supported_vendors(&self) -> Vec<Vendor> {
        vec![Vendor::new(VENDOR_ID, "Virtual")]
    }

    fn supported_devices(&self) -> Vec<DeviceClass> {
        vec![Self::lamp_class(), Self::socket_class()]
    }

    fn required_hardware(&self) -> HardwareResources {
        HardwareResources::none().with(HardwareResource::Timer)
    }

    fn init(&mut self, emitter: PluginEmitter) {
        self.emitter = Some(emitter);
    }

    fn discover_devices(
        &mut self,
        device_class_id: DeviceClassId,
        _params: &[Param],
    ) -> Result<Completion, DeviceError> {
        if device_class_id != SOCKET_CLASS_ID {
            return Err(DeviceError::CreationMethodNotSupported);
        }
        let Some(emitter) = self.emitter.clone() else {
            return Err(DeviceError::HardwareNotAvailable);
        };
        // Queued now, delivered on the next dispatch iteration.
        let descriptors = vec![
            DeviceDescriptor::new("Virtual Socket 1", "simulated socket")
                .with_params(vec![Param::new("number", ParamValue::Uint(1))]),
            DeviceDescriptor::new("Virtual Socket 2", "simulated socket")
                .with_params(vec![Param::new("number", ParamValue::Uint(2))]),
        ];
        emitter.devices_discovered(device_class_id, descriptors);
        Ok(Completion::Pending)
    }

    fn setup_device(&mut self, device: &Device) -> SetupStatus {
        tracing::debug!(device = %device.id, name = device.name, "setting up virtual device");
        self.devices.insert(device.id, device.device_class_id);
        self.uptime.insert(device.id, 0);
        SetupStatus::Success
    }

    fn confirm_pairing(
        &mut self,
        transaction_id: PairingTransactionId,
        device_class_id: DeviceClassId,
        _params: &[Param],
    ) -> SetupStatus {
        if device_class_id != SOCKET_CLASS_ID {
            return SetupStatus::Failure;
        }
        let Some(emitter) = &self.emitter else {
            return SetupStatus::Failure;
        };
        // The button is always pressed in the simulation.
        emitter.pairing_finished(transaction_id, SetupStatus::Success);
        SetupStatus::Async
    }

    fn execute_action(&mut self, device: &Device, action: &Action) -> Result<Completion, DeviceError> {
        match action.action_type_id {
            id if id == LAMP_SET_POWER_ACTION_ID || id == SOCKET_SET_POWER_ACTION_ID => {
                let Some(value) = param_value(&action.params, "power") else {
                    return Err(DeviceError::MissingParameter);
                };
                let state_type_id = if id == LAMP_SET_POWER_ACTION_ID {
                    LAMP_POWER_STATE_ID
                } else {
                    SOCKET_POWER_STATE_ID
                };
                self.emit_state(device.id, state_type_id, value.clone());
                Ok(Completion::Done)
            }
            id if id == LAMP_SET_BRIGHTNESS_ACTION_ID => {
                let Some(value) = param_value(&action.params, "brightness") else {
                    return Err(DeviceError::MissingParameter);
                };
                self.emit_state(device.id, LAMP_BRIGHTNESS_STATE_ID, value.clone());
                Ok(Completion::Done)
            }
            _ => Err(DeviceError::ActionTypeNotFound),
        }
    }

    fn device_removed(&mut self, device: &Device) {
        self.devices.remove(&device.id);
        self.uptime.remove(&device.id);
    }

    fn timer_tick(&mut self) {
        let lamps: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|(_, class)| **class == LAMP_CLASS_ID)
            .map(|(id, _)| *id)
            .collect();
        for device_id in lamps {
            let uptime = self.uptime.entry(device_id).or_insert(0);
            *uptime += 1;
            let value = ParamValue::Uint(*uptime);
            self.emit_state(device_id, LAMP_UPTIME_STATE_ID, value);
        }
    }
}

/// Loader-port provider yielding the virtual plugin and its metadata.
#[derive(Debug, Default)]
pub struct VirtualPluginProvider {
    loaded: bool,
}

impl VirtualPluginProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PluginProvider for VirtualPluginProvider {
    fn load(&mut self) -> Vec<PluginPackage> {
        if self.loaded {
            return Vec::new();
        }
        self.loaded = true;
        vec![PluginPackage {
            metadata: serde_json::json!({
                "name": "virtual",
                "id": PLUGIN_ID.to_string(),
                "vendors": [{"name": "Virtual", "id": VENDOR_ID.to_string()}],
            }),
            plugin: Box::new(VirtualPlugin::default()),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hearth_core::event_bus::Notification;
    use hearth_core::manager::{DeviceManager, ManagerConfig};
    use hearth_core::ports::settings::MemorySettings;

    fn manager() -> (
        DeviceManager<MemorySettings>,
        tokio::sync::mpsc::UnboundedReceiver<hearth_core::ports::plugin::PluginSignal>,
    ) {
        let (mut manager, signals) =
            DeviceManager::new(ManagerConfig::default(), MemorySettings::new());
        manager.register_plugins(&mut VirtualPluginProvider::new());
        (manager, signals)
    }

    fn drain(
        manager: &mut DeviceManager<MemorySettings>,
        signals: &mut tokio::sync::mpsc::UnboundedReceiver<hearth_core::ports::plugin::PluginSignal>,
    ) {
        while let Ok(signal) = signals.try_recv() {
            manager.handle_signal(signal);
        }
    }

    #[test]
    fn should_register_vendor_and_both_classes() {
        let (manager, _signals) = manager();
        assert_eq!(manager.supported_vendors().len(), 1);
        assert_eq!(manager.supported_devices(Some(VENDOR_ID)).len(), 2);
    }

    #[test]
    fn should_add_lamp_and_default_the_port() {
        let (mut manager, _signals) = manager();
        let id = DeviceId::new();
        manager
            .add_configured_device(
                LAMP_CLASS_ID,
                vec![Param::new("host", ParamValue::String("lamp.local".into()))],
                Some(id),
            )
            .unwrap();

        let device = manager.find_configured_device(id).unwrap();
        assert_eq!(device.param("port"), Some(&ParamValue::Int(8080)));
        assert_eq!(
            device.state_value(LAMP_POWER_STATE_ID),
            Some(&ParamValue::Bool(false))
        );
    }

    #[test]
    fn should_apply_set_power_action_through_state_change() {
        let (mut manager, mut signals) = manager();
        let id = DeviceId::new();
        manager
            .add_configured_device(
                LAMP_CLASS_ID,
                vec![Param::new("host", ParamValue::String("lamp.local".into()))],
                Some(id),
            )
            .unwrap();

        let action = Action::new(
            id,
            LAMP_SET_POWER_ACTION_ID,
            vec![Param::new("power", ParamValue::Bool(true))],
        );
        assert_eq!(manager.execute_action(action), Ok(Completion::Done));
        drain(&mut manager, &mut signals);

        let device = manager.find_configured_device(id).unwrap();
        assert_eq!(
            device.state_value(LAMP_POWER_STATE_ID),
            Some(&ParamValue::Bool(true))
        );
    }

    #[test]
    fn should_reject_brightness_out_of_range() {
        let (mut manager, _signals) = manager();
        let id = DeviceId::new();
        manager
            .add_configured_device(
                LAMP_CLASS_ID,
                vec![Param::new("host", ParamValue::String("lamp.local".into()))],
                Some(id),
            )
            .unwrap();

        let action = Action::new(
            id,
            LAMP_SET_BRIGHTNESS_ACTION_ID,
            vec![Param::new("brightness", ParamValue::Uint(150))],
        );
        assert_eq!(
            manager.execute_action(action),
            Err(DeviceError::InvalidParameter)
        );
    }

    #[test]
    fn should_discover_two_sockets_and_pair_one() {
        let (mut manager, mut signals) = manager();
        let mut rx = manager.subscribe();

        assert_eq!(
            manager.discover_devices(SOCKET_CLASS_ID, vec![]),
            Ok(Completion::Pending)
        );
        drain(&mut manager, &mut signals);

        let descriptors = match rx.try_recv().unwrap() {
            Notification::DevicesDiscovered { descriptors, .. } => descriptors,
            other => panic!("unexpected notification: {other:?}"),
        };
        assert_eq!(descriptors.len(), 2);

        let txn = PairingTransactionId::new();
        manager
            .pair_device_from_descriptor(txn, SOCKET_CLASS_ID, descriptors[0].id)
            .unwrap();
        assert_eq!(manager.confirm_pairing(txn, ""), Ok(Completion::Pending));
        drain(&mut manager, &mut signals);

        let paired_id = match rx.try_recv().unwrap() {
            Notification::PairingFinished { result, device_id, .. } => {
                assert!(result.is_ok());
                device_id.unwrap()
            }
            other => panic!("unexpected notification: {other:?}"),
        };
        let device = manager.find_configured_device(paired_id).unwrap();
        assert_eq!(device.param("number"), Some(&ParamValue::Uint(1)));
    }

    #[test]
    fn should_count_uptime_on_timer_ticks() {
        let (mut manager, mut signals) = manager();
        let id = DeviceId::new();
        manager
            .add_configured_device(
                LAMP_CLASS_ID,
                vec![Param::new("host", ParamValue::String("lamp.local".into()))],
                Some(id),
            )
            .unwrap();
        // The immediate tick at setup already counted once.
        manager.dispatch_timer_tick();
        drain(&mut manager, &mut signals);

        let device = manager.find_configured_device(id).unwrap();
        assert_eq!(
            device.state_value(LAMP_UPTIME_STATE_ID),
            Some(&ParamValue::Uint(2))
        );
    }
}
