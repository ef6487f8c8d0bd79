//! The device-plugin contract.
//!
//! A plugin bridges one protocol or device family into the system. The
//! manager calls the trait's slots synchronously on the dispatcher thread;
//! a plugin doing long work (hardware IO, discovery) must offload it
//! itself, return the asynchronous sentinel, and complete later through
//! its [`PluginEmitter`].

use tokio::sync::mpsc;

use hearth_domain::action::Action;
use hearth_domain::device::{Device, DeviceDescriptor};
use hearth_domain::device_class::{DeviceClass, Vendor};
use hearth_domain::error::{Completion, DeviceError, SetupStatus};
use hearth_domain::hardware::HardwareResources;
use hearth_domain::id::{
    ActionId, DeviceClassId, DeviceId, PairingTransactionId, PluginId, StateTypeId,
};
use hearth_domain::event::Event;
use hearth_domain::params::{Param, ParamType, ParamValue};

use crate::hardware::UpnpDescriptor;

/// A loadable device plugin.
///
/// The manager owns every plugin for the daemon's lifetime and calls the
/// lifecycle slots in this order:
///
/// 1. [`init`](Self::init) — receives the emitter for asynchronous signals
/// 2. [`set_configuration`](Self::set_configuration) — stored or default config
/// 3. (the daemon runs: discovery, setup, actions, hardware callbacks)
/// 4. [`device_removed`](Self::device_removed) per device on teardown
///
/// Default implementations make every slot beyond the descriptive ones
/// optional, so a minimal plugin only describes itself.
pub trait DevicePlugin: Send {
    fn plugin_id(&self) -> PluginId;

    fn plugin_name(&self) -> &str;

    /// The vendors this plugin publishes device classes for.
    fn supported_vendors(&self) -> Vec<Vendor>;

    /// The device classes this plugin can produce instances of.
    fn supported_devices(&self) -> Vec<DeviceClass>;

    /// The plugin-level configuration slots, if any.
    fn configuration_description(&self) -> Vec<ParamType> {
        Vec::new()
    }

    /// The shared hardware resources this plugin needs fanned out to it.
    fn required_hardware(&self) -> HardwareResources {
        HardwareResources::none()
    }

    /// Called once at registration. The emitter is the plugin's only way
    /// to deliver asynchronous completions and spontaneous signals.
    fn init(&mut self, emitter: PluginEmitter) {
        let _ = emitter;
    }

    /// Apply a plugin-level configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidParameter`] (or another variant) when
    /// the configuration is not acceptable.
    fn set_configuration(&mut self, params: Vec<Param>) -> Result<(), DeviceError> {
        let _ = params;
        Ok(())
    }

    /// The currently applied plugin-level configuration.
    fn configuration(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Start a discovery run for the given class.
    ///
    /// `Pending` promises a later
    /// [`devices_discovered`](PluginEmitter::devices_discovered) signal
    /// with the same class id.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::CreationMethodNotSupported`] by default.
    fn discover_devices(
        &mut self,
        device_class_id: DeviceClassId,
        params: &[Param],
    ) -> Result<Completion, DeviceError> {
        let _ = (device_class_id, params);
        Err(DeviceError::CreationMethodNotSupported)
    }

    /// Set a device up. `Async` promises exactly one later
    /// [`device_setup_finished`](PluginEmitter::device_setup_finished)
    /// with a terminal status.
    fn setup_device(&mut self, device: &Device) -> SetupStatus {
        let _ = device;
        SetupStatus::Success
    }

    /// Confirm a pairing handshake. `Async` promises a later
    /// [`pairing_finished`](PluginEmitter::pairing_finished).
    fn confirm_pairing(
        &mut self,
        transaction_id: PairingTransactionId,
        device_class_id: DeviceClassId,
        params: &[Param],
    ) -> SetupStatus {
        let _ = (transaction_id, device_class_id, params);
        SetupStatus::Failure
    }

    /// Execute an action against a device. `Pending` promises a later
    /// [`action_execution_finished`](PluginEmitter::action_execution_finished)
    /// with the same action id.
    ///
    /// # Errors
    ///
    /// Returns the plugin's [`DeviceError`].
    fn execute_action(&mut self, device: &Device, action: &Action) -> Result<Completion, DeviceError> {
        let _ = (device, action);
        Ok(Completion::Done)
    }

    /// Begin watching for auto-created devices, if the plugin has any.
    fn start_monitoring_auto_devices(&mut self) {}

    /// A configured device of this plugin was removed.
    fn device_removed(&mut self, device: &Device) {
        let _ = device;
    }

    // Hardware callbacks, delivered when the plugin's required resources
    // include the source.

    fn radio_data(&mut self, raw: &[i32]) {
        let _ = raw;
    }

    fn upnp_discovery_finished(&mut self, descriptors: &[UpnpDescriptor]) {
        let _ = descriptors;
    }

    fn upnp_notify_received(&mut self, data: &[u8]) {
        let _ = data;
    }

    fn timer_tick(&mut self) {}
}

/// A plugin-originated signal, tagged with the emitting plugin.
///
/// Signals are queued and processed on the next dispatcher iteration, so
/// plugins may emit from within manager-invoked slots.
#[derive(Debug, Clone)]
pub struct PluginSignal {
    pub plugin_id: PluginId,
    pub kind: PluginSignalKind,
}

/// The payload of a [`PluginSignal`].
#[derive(Debug, Clone)]
pub enum PluginSignalKind {
    /// A discovery run finished with these candidates.
    DevicesDiscovered {
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    },
    /// An asynchronous setup reached a terminal status.
    DeviceSetupFinished {
        device_id: DeviceId,
        status: SetupStatus,
    },
    /// An asynchronous pairing confirmation reached a terminal status.
    PairingFinished {
        transaction_id: PairingTransactionId,
        status: SetupStatus,
    },
    /// An asynchronous action execution completed.
    ActionExecutionFinished {
        action_id: ActionId,
        result: Result<(), DeviceError>,
    },
    /// The plugin asserts devices that should exist without user consent.
    AutoDevicesAppeared {
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    },
    /// A domain event, forwarded verbatim to the event channel.
    EventEmitted { event: Event },
    /// A device state changed value.
    StateValueChanged {
        device_id: DeviceId,
        state_type_id: StateTypeId,
        value: ParamValue,
    },
}

/// The plugin's sending half of the signal channel.
///
/// Cloneable and cheap; sending never blocks. Signals sent after shutdown
/// are silently dropped.
#[derive(Debug, Clone)]
pub struct PluginEmitter {
    plugin_id: PluginId,
    tx: mpsc::UnboundedSender<PluginSignal>,
}

impl PluginEmitter {
    #[must_use]
    pub fn new(plugin_id: PluginId, tx: mpsc::UnboundedSender<PluginSignal>) -> Self {
        Self { plugin_id, tx }
    }

    fn send(&self, kind: PluginSignalKind) {
        let _ = self.tx.send(PluginSignal {
            plugin_id: self.plugin_id,
            kind,
        });
    }

    pub fn devices_discovered(
        &self,
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    ) {
        self.send(PluginSignalKind::DevicesDiscovered {
            device_class_id,
            descriptors,
        });
    }

    pub fn device_setup_finished(&self, device_id: DeviceId, status: SetupStatus) {
        self.send(PluginSignalKind::DeviceSetupFinished { device_id, status });
    }

    pub fn pairing_finished(&self, transaction_id: PairingTransactionId, status: SetupStatus) {
        self.send(PluginSignalKind::PairingFinished {
            transaction_id,
            status,
        });
    }

    pub fn action_execution_finished(&self, action_id: ActionId, result: Result<(), DeviceError>) {
        self.send(PluginSignalKind::ActionExecutionFinished { action_id, result });
    }

    pub fn auto_devices_appeared(
        &self,
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    ) {
        self.send(PluginSignalKind::AutoDevicesAppeared {
            device_class_id,
            descriptors,
        });
    }

    pub fn emit_event(&self, event: Event) {
        self.send(PluginSignalKind::EventEmitted { event });
    }

    pub fn state_value_changed(
        &self,
        device_id: DeviceId,
        state_type_id: StateTypeId,
        value: ParamValue,
    ) {
        self.send(PluginSignalKind::StateValueChanged {
            device_id,
            state_type_id,
            value,
        });
    }
}
