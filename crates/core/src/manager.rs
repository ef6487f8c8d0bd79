//! The device manager — the device lifecycle state machine.
//!
//! Owns the configured-device arena, the discovery and pairing tables, and
//! the in-flight transaction deadlines. Every operation runs to completion
//! on the dispatcher thread; plugin signals queued during an operation are
//! processed on the next dispatch iteration via
//! [`handle_signal`](DeviceManager::handle_signal).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use hearth_domain::action::Action;
use hearth_domain::device::{Device, DeviceDescriptor};
use hearth_domain::device_class::{CreateMethod, DeviceClass, SetupMethod, Vendor};
use hearth_domain::error::{Completion, DeviceError, SetupStatus};
use hearth_domain::event::Event;
use hearth_domain::hardware::HardwareResource;
use hearth_domain::id::{
    ActionId, DeviceClassId, DeviceDescriptorId, DeviceId, PairingTransactionId, PluginId,
    StateTypeId, VendorId,
};
use hearth_domain::params::{verify_params, Param, ParamValue};
use hearth_domain::time::{now, Timestamp};

use crate::catalog::Catalog;
use crate::event_bus::{Notification, NotificationBus};
use crate::hardware::HardwareEvent;
use crate::ports::plugin::{DevicePlugin, PluginEmitter, PluginSignal, PluginSignalKind};
use crate::ports::provider::{missing_metadata_field, PluginProvider};
use crate::ports::settings::SettingsStore;
use crate::registry::PluginRegistry;
use crate::storage::DeviceStore;

/// Tunables of the manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Interval of the shared periodic timer.
    pub timer_interval: Duration,
    /// Upper bound on every in-flight plugin transaction. A plugin that
    /// fails to complete within the bound gets a synthetic failure
    /// published on its behalf, and its late signal is then dropped.
    pub transaction_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            timer_interval: Duration::from_secs(15),
            transaction_timeout: Duration::from_secs(60),
        }
    }
}

/// A descriptor held between discovery and consumption, tagged with the
/// class whose discovery produced it.
#[derive(Debug, Clone)]
struct DiscoveredCandidate {
    device_class_id: DeviceClassId,
    descriptor: DeviceDescriptor,
}

/// A pairing started from user-specified parameters.
#[derive(Debug, Clone)]
struct JustAddPairing {
    device_class_id: DeviceClassId,
    params: Vec<Param>,
}

/// A pairing started from a discovered descriptor. The descriptor is
/// consumed from the discovery table when the pairing starts and lives
/// here until the transaction terminates.
#[derive(Debug, Clone)]
struct DiscoveryPairing {
    device_class_id: DeviceClassId,
    descriptor: DeviceDescriptor,
}

/// An in-flight discovery run.
#[derive(Debug, Clone)]
struct DiscoveryRun {
    plugin_id: PluginId,
    device_class_id: DeviceClassId,
    deadline: Timestamp,
}

/// The main entry point when interacting with devices.
///
/// Holds all information about supported and configured devices, drives
/// the discover → pair → setup → run → remove lifecycle, and mediates the
/// shared hardware resources between plugins.
pub struct DeviceManager<S> {
    config: ManagerConfig,
    // Declared before the registry: devices drop before plugins.
    devices: HashMap<DeviceId, Device>,
    registry: PluginRegistry,
    catalog: Catalog,
    store: DeviceStore<S>,
    notifications: NotificationBus,
    signal_tx: mpsc::UnboundedSender<PluginSignal>,
    discovered: HashMap<DeviceDescriptorId, DiscoveredCandidate>,
    discovering: Vec<DiscoveryRun>,
    pairings_just_add: HashMap<PairingTransactionId, JustAddPairing>,
    pairings_discovery: HashMap<PairingTransactionId, DiscoveryPairing>,
    pairing_deadlines: HashMap<PairingTransactionId, Timestamp>,
    /// Devices whose asynchronous setup has not yet terminated and which
    /// are not part of the configured set.
    provisional: HashMap<DeviceId, Device>,
    setup_deadlines: HashMap<DeviceId, Timestamp>,
    pending_actions: HashMap<ActionId, Timestamp>,
    timer_users: Vec<DeviceId>,
}

impl<S: SettingsStore> DeviceManager<S> {
    /// Create a manager over the given settings store.
    ///
    /// Returns the receiving half of the plugin-signal channel; the host
    /// loop drains it into [`handle_signal`](Self::handle_signal).
    pub fn new(
        config: ManagerConfig,
        settings: S,
    ) -> (Self, mpsc::UnboundedReceiver<PluginSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let manager = Self {
            config,
            devices: HashMap::new(),
            registry: PluginRegistry::new(),
            catalog: Catalog::new(),
            store: DeviceStore::new(settings),
            notifications: NotificationBus::new(),
            signal_tx,
            discovered: HashMap::new(),
            discovering: Vec::new(),
            pairings_just_add: HashMap::new(),
            pairings_discovery: HashMap::new(),
            pairing_deadlines: HashMap::new(),
            provisional: HashMap::new(),
            setup_deadlines: HashMap::new(),
            pending_actions: HashMap::new(),
            timer_users: Vec::new(),
        };
        (manager, signal_rx)
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Subscribe to the manager's notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    // ── Registration and startup ───────────────────────────────────

    /// Pull plugins from the loader port and register them.
    ///
    /// Packages with incomplete metadata, duplicate plugin ids, duplicate
    /// vendors, and classes with unknown vendors are skipped with a
    /// warning; a bad plugin never aborts the load.
    pub fn register_plugins(&mut self, provider: &mut dyn PluginProvider) {
        for package in provider.load() {
            if let Some(field) = missing_metadata_field(&package.metadata) {
                warn!(missing = field, "refusing plugin with incomplete metadata");
                continue;
            }
            self.register_plugin(package.plugin);
        }
    }

    fn register_plugin(&mut self, mut plugin: Box<dyn DevicePlugin>) {
        let plugin_id = plugin.plugin_id();
        if self.registry.contains(plugin_id) {
            warn!(plugin = %plugin_id, "duplicate plugin id, ignoring");
            return;
        }
        debug!(plugin = plugin.plugin_name(), "loading plugin");

        for vendor in plugin.supported_vendors() {
            if !self.catalog.add_vendor(vendor.clone()) {
                warn!(vendor = %vendor.name, "duplicate vendor, ignoring");
            }
        }
        for class in plugin.supported_devices() {
            if !self.catalog.add_device_class(class.clone()) {
                warn!(class = %class.name, "unknown vendor or duplicate class, ignoring");
            }
        }

        let stored = match self.store.load_plugin_config(plugin_id) {
            Ok(params) => params,
            Err(err) => {
                warn!(%err, "failed to load plugin configuration");
                Vec::new()
            }
        };
        let params = if stored.is_empty() {
            // Nothing stored: initialize from the declared defaults.
            plugin
                .configuration_description()
                .iter()
                .filter_map(|t| {
                    t.default_value
                        .clone()
                        .map(|v| Param::new(t.name.clone(), v))
                })
                .collect()
        } else {
            stored
        };
        if !params.is_empty() {
            if let Err(err) = plugin.set_configuration(params) {
                warn!(plugin = %plugin_id, %err, "plugin rejected its stored configuration");
            }
        }

        plugin.init(PluginEmitter::new(plugin_id, self.signal_tx.clone()));
        self.registry.insert(plugin);
    }

    /// Recreate every persisted device and run it through setup.
    ///
    /// Stored devices stay in the configured set even when their setup
    /// fails or is still pending — rules may reference them; they are just
    /// not functional until `setup_complete`.
    pub fn load_configured_devices(&mut self) {
        let records = match self.store.load_devices() {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "failed to load configured devices");
                return;
            }
        };
        for record in records {
            if self.devices.contains_key(&record.id) {
                warn!(device = %record.id, "duplicate stored device id, skipping");
                continue;
            }
            let mut device = Device::new(
                record.id,
                record.device_class_id,
                record.plugin_id,
                record.name,
            );
            device.params = record.params;
            let status = self.run_setup(&mut device);
            let device_id = device.id;
            self.devices.insert(device_id, device);
            match status {
                SetupStatus::Success => self.finish_setup_success(device_id, false),
                SetupStatus::Async => {
                    self.setup_deadlines.insert(device_id, self.deadline());
                }
                SetupStatus::Failure => {
                    warn!(device = %device_id, "stored device failed setup, not functional");
                    self.publish(Notification::DeviceSetupFinished {
                        device_id,
                        result: Err(DeviceError::SetupFailed),
                    });
                }
            }
        }
    }

    /// Ask every plugin to start watching for auto-created devices.
    pub fn start_monitoring_auto_devices(&mut self) {
        for plugin in self.registry.iter_mut() {
            plugin.start_monitoring_auto_devices();
        }
    }

    /// Publish the `Loaded` notification. Call once plugins and devices
    /// are loaded.
    pub fn announce_loaded(&self) {
        self.publish(Notification::Loaded);
    }

    // ── Catalog queries ────────────────────────────────────────────

    #[must_use]
    pub fn supported_vendors(&self) -> Vec<Vendor> {
        self.catalog.vendors()
    }

    /// All supported device classes, optionally filtered by vendor.
    #[must_use]
    pub fn supported_devices(&self, vendor_id: Option<VendorId>) -> Vec<DeviceClass> {
        self.catalog.device_classes(vendor_id)
    }

    // ── Configured devices ─────────────────────────────────────────

    #[must_use]
    pub fn configured_devices(&self) -> Vec<&Device> {
        self.devices.values().collect()
    }

    #[must_use]
    pub fn find_configured_device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    /// All configured devices of the given class.
    #[must_use]
    pub fn find_configured_devices(&self, class_id: DeviceClassId) -> Vec<&Device> {
        self.devices
            .values()
            .filter(|d| d.device_class_id == class_id)
            .collect()
    }

    // ── Plugin configuration ───────────────────────────────────────

    /// Apply and persist a plugin-level configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::PluginNotFound`] for an unknown plugin, or
    /// whatever the plugin itself rejects the configuration with.
    pub fn set_plugin_config(
        &mut self,
        plugin_id: PluginId,
        params: Vec<Param>,
    ) -> Result<(), DeviceError> {
        let Some(plugin) = self.registry.get_mut(plugin_id) else {
            return Err(DeviceError::PluginNotFound);
        };
        plugin.set_configuration(params.clone())?;
        if let Err(err) = self.store.store_plugin_config(plugin_id, &params) {
            warn!(%err, "failed to persist plugin configuration");
        }
        Ok(())
    }

    /// The currently applied configuration of a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::PluginNotFound`] for an unknown plugin.
    pub fn plugin_config(&self, plugin_id: PluginId) -> Result<Vec<Param>, DeviceError> {
        self.registry
            .get(plugin_id)
            .map(|plugin| plugin.configuration())
            .ok_or(DeviceError::PluginNotFound)
    }

    // ── Discovery ──────────────────────────────────────────────────

    /// Start a discovery run for the given class.
    ///
    /// `Pending` means the plugin will report candidates later; completed
    /// runs publish [`Notification::DevicesDiscovered`] and replace the
    /// class's previous candidate batch.
    ///
    /// # Errors
    ///
    /// Returns a lookup or parameter error, or the plugin's own failure.
    pub fn discover_devices(
        &mut self,
        device_class_id: DeviceClassId,
        params: Vec<Param>,
    ) -> Result<Completion, DeviceError> {
        let class = self
            .catalog
            .device_class(device_class_id)
            .cloned()
            .ok_or(DeviceError::DeviceClassNotFound)?;
        if !class.create_methods.contains(CreateMethod::Discovery) {
            return Err(DeviceError::CreationMethodNotSupported);
        }
        let filled = verify_params(&class.discovery_param_types, &params, true)?;
        let deadline = self.deadline();
        let Some(plugin) = self.registry.get_mut(class.plugin_id) else {
            return Err(DeviceError::PluginNotFound);
        };
        match plugin.discover_devices(device_class_id, &filled)? {
            Completion::Done => Ok(Completion::Done),
            Completion::Pending => {
                self.discovering.push(DiscoveryRun {
                    plugin_id: class.plugin_id,
                    device_class_id,
                    deadline,
                });
                Ok(Completion::Pending)
            }
        }
    }

    // ── Adding devices ─────────────────────────────────────────────

    /// Add a configured device from user-specified parameters.
    ///
    /// Only classes with the `User` create method accept this. Omitting
    /// `device_id` generates one.
    ///
    /// # Errors
    ///
    /// See [`DeviceError`]; notably [`DeviceError::DuplicateUuid`] when
    /// the id is already taken and [`DeviceError::SetupFailed`] when the
    /// plugin rejects the device.
    pub fn add_configured_device(
        &mut self,
        device_class_id: DeviceClassId,
        params: Vec<Param>,
        device_id: Option<DeviceId>,
    ) -> Result<Completion, DeviceError> {
        let class = self
            .catalog
            .device_class(device_class_id)
            .ok_or(DeviceError::DeviceClassNotFound)?;
        if !class.create_methods.contains(CreateMethod::User) {
            return Err(DeviceError::CreationMethodNotSupported);
        }
        self.add_configured_device_internal(device_class_id, params, device_id.unwrap_or_default())
    }

    /// Add a configured device from a discovered descriptor, consuming it.
    ///
    /// Only classes with the `Discovery` create method accept this.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::DeviceDescriptorNotFound`] when the
    /// descriptor is absent (e.g. already consumed), plus everything
    /// [`add_configured_device`](Self::add_configured_device) can return.
    pub fn add_configured_device_from_descriptor(
        &mut self,
        device_class_id: DeviceClassId,
        descriptor_id: DeviceDescriptorId,
        device_id: Option<DeviceId>,
    ) -> Result<Completion, DeviceError> {
        let class = self
            .catalog
            .device_class(device_class_id)
            .ok_or(DeviceError::DeviceClassNotFound)?;
        if !class.create_methods.contains(CreateMethod::Discovery) {
            return Err(DeviceError::CreationMethodNotSupported);
        }
        let candidate = self
            .discovered
            .remove(&descriptor_id)
            .ok_or(DeviceError::DeviceDescriptorNotFound)?;
        self.add_configured_device_internal(
            device_class_id,
            candidate.descriptor.params,
            device_id.unwrap_or_default(),
        )
    }

    fn add_configured_device_internal(
        &mut self,
        device_class_id: DeviceClassId,
        params: Vec<Param>,
        device_id: DeviceId,
    ) -> Result<Completion, DeviceError> {
        let class = self
            .catalog
            .device_class(device_class_id)
            .cloned()
            .ok_or(DeviceError::DeviceClassNotFound)?;
        if class.setup_method != SetupMethod::JustAdd {
            // Everything else goes through the pairing machinery.
            return Err(DeviceError::CreationMethodNotSupported);
        }
        let filled = verify_params(&class.param_types, &params, true)?;
        if self.devices.contains_key(&device_id) || self.provisional.contains_key(&device_id) {
            return Err(DeviceError::DuplicateUuid);
        }
        if !self.registry.contains(class.plugin_id) {
            return Err(DeviceError::PluginNotFound);
        }

        let mut device = Device::new(device_id, device_class_id, class.plugin_id, class.name);
        device.params = filled;
        match self.run_setup(&mut device) {
            SetupStatus::Failure => {
                warn!(device = %device_id, "device setup failed, not adding device");
                Err(DeviceError::SetupFailed)
            }
            SetupStatus::Async => {
                self.setup_deadlines.insert(device_id, self.deadline());
                self.provisional.insert(device_id, device);
                Ok(Completion::Pending)
            }
            SetupStatus::Success => {
                self.devices.insert(device_id, device);
                self.finish_setup_success(device_id, true);
                Ok(Completion::Done)
            }
        }
    }

    // ── Pairing ────────────────────────────────────────────────────

    /// Start a pairing transaction from user-specified parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::SetupMethodNotSupported`] for `JustAdd`
    /// classes (nothing to pair) and [`DeviceError::SetupFailed`] for
    /// `DisplayPin` classes (pin production is not implemented).
    pub fn pair_device(
        &mut self,
        transaction_id: PairingTransactionId,
        device_class_id: DeviceClassId,
        params: Vec<Param>,
    ) -> Result<(), DeviceError> {
        let class = self
            .catalog
            .device_class(device_class_id)
            .cloned()
            .ok_or(DeviceError::DeviceClassNotFound)?;
        match class.setup_method {
            SetupMethod::JustAdd => Err(DeviceError::SetupMethodNotSupported),
            SetupMethod::DisplayPin => {
                warn!("display-pin setup cannot produce a pin yet");
                Err(DeviceError::SetupFailed)
            }
            SetupMethod::EnterPin | SetupMethod::PushButton => {
                let filled = verify_params(&class.param_types, &params, true)?;
                self.pairings_just_add.insert(
                    transaction_id,
                    JustAddPairing {
                        device_class_id,
                        params: filled,
                    },
                );
                Ok(())
            }
        }
    }

    /// Start a pairing transaction from a discovered descriptor,
    /// consuming it.
    ///
    /// # Errors
    ///
    /// As [`pair_device`](Self::pair_device), plus
    /// [`DeviceError::DeviceDescriptorNotFound`].
    pub fn pair_device_from_descriptor(
        &mut self,
        transaction_id: PairingTransactionId,
        device_class_id: DeviceClassId,
        descriptor_id: DeviceDescriptorId,
    ) -> Result<(), DeviceError> {
        let class = self
            .catalog
            .device_class(device_class_id)
            .ok_or(DeviceError::DeviceClassNotFound)?;
        match class.setup_method {
            SetupMethod::JustAdd => return Err(DeviceError::SetupMethodNotSupported),
            SetupMethod::DisplayPin => {
                warn!("display-pin setup cannot produce a pin yet");
                return Err(DeviceError::SetupFailed);
            }
            SetupMethod::EnterPin | SetupMethod::PushButton => {}
        }
        let candidate = self
            .discovered
            .remove(&descriptor_id)
            .ok_or(DeviceError::DeviceDescriptorNotFound)?;
        self.pairings_discovery.insert(
            transaction_id,
            DiscoveryPairing {
                device_class_id,
                descriptor: candidate.descriptor,
            },
        );
        Ok(())
    }

    /// Confirm a pairing transaction.
    ///
    /// `secret` is accepted but reserved for pin-based setup methods.
    /// On `Pending`, the plugin's `pairing_finished` signal terminates the
    /// transaction; on sync success the device goes straight into setup
    /// and [`Notification::PairingFinished`] carries its new id.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::PairingTransactionIdNotFound`] for an
    /// unknown transaction, [`DeviceError::SetupFailed`] when the plugin
    /// refuses, and lookup errors when the class or plugin vanished.
    pub fn confirm_pairing(
        &mut self,
        transaction_id: PairingTransactionId,
        secret: &str,
    ) -> Result<Completion, DeviceError> {
        let _ = secret;
        let (device_class_id, params) =
            if let Some(pairing) = self.pairings_just_add.get(&transaction_id) {
                (pairing.device_class_id, pairing.params.clone())
            } else if let Some(pairing) = self.pairings_discovery.get(&transaction_id) {
                (pairing.device_class_id, pairing.descriptor.params.clone())
            } else {
                return Err(DeviceError::PairingTransactionIdNotFound);
            };

        let plugin_id = self
            .catalog
            .device_class(device_class_id)
            .ok_or(DeviceError::DeviceClassNotFound)?
            .plugin_id;
        let Some(plugin) = self.registry.get_mut(plugin_id) else {
            return Err(DeviceError::PluginNotFound);
        };
        match plugin.confirm_pairing(transaction_id, device_class_id, &params) {
            SetupStatus::Success => {
                self.remove_pairing(transaction_id);
                self.conclude_pairing(transaction_id, device_class_id, params);
                Ok(Completion::Done)
            }
            SetupStatus::Failure => {
                self.remove_pairing(transaction_id);
                Err(DeviceError::SetupFailed)
            }
            SetupStatus::Async => {
                self.pairing_deadlines.insert(transaction_id, self.deadline());
                Ok(Completion::Pending)
            }
        }
    }

    fn remove_pairing(&mut self, transaction_id: PairingTransactionId) {
        self.pairings_just_add.remove(&transaction_id);
        self.pairings_discovery.remove(&transaction_id);
        self.pairing_deadlines.remove(&transaction_id);
    }

    /// Successful pairing: announce the minted device id and run setup.
    fn conclude_pairing(
        &mut self,
        transaction_id: PairingTransactionId,
        device_class_id: DeviceClassId,
        params: Vec<Param>,
    ) {
        let Some(class) = self.catalog.device_class(device_class_id).cloned() else {
            self.publish(Notification::PairingFinished {
                transaction_id,
                result: Err(DeviceError::DeviceClassNotFound),
                device_id: None,
            });
            return;
        };
        if !self.registry.contains(class.plugin_id) {
            warn!(plugin = %class.plugin_id, "no plugin for paired device class");
            self.publish(Notification::PairingFinished {
                transaction_id,
                result: Err(DeviceError::PluginNotFound),
                device_id: None,
            });
            return;
        }

        let device_id = DeviceId::new();
        self.publish(Notification::PairingFinished {
            transaction_id,
            result: Ok(()),
            device_id: Some(device_id),
        });

        let mut device = Device::new(device_id, device_class_id, class.plugin_id, class.name);
        device.params = params;
        match self.run_setup(&mut device) {
            SetupStatus::Failure => {
                warn!(device = %device_id, "device setup failed, not adding device");
                self.publish(Notification::DeviceSetupFinished {
                    device_id,
                    result: Err(DeviceError::SetupFailed),
                });
            }
            SetupStatus::Async => {
                self.setup_deadlines.insert(device_id, self.deadline());
                self.provisional.insert(device_id, device);
            }
            SetupStatus::Success => {
                self.devices.insert(device_id, device);
                self.finish_setup_success(device_id, true);
            }
        }
    }

    // ── Actions ────────────────────────────────────────────────────

    /// Validate and dispatch an action to the owning plugin.
    ///
    /// The filled parameter list is written back into the dispatched
    /// action. `Pending` registers the action id; the plugin's
    /// `action_execution_finished` signal resolves it.
    ///
    /// # Errors
    ///
    /// Lookup and parameter errors are reported before any plugin call;
    /// plugin failures are returned as-is.
    pub fn execute_action(&mut self, action: Action) -> Result<Completion, DeviceError> {
        let device = self
            .devices
            .get(&action.device_id)
            .ok_or(DeviceError::DeviceNotFound)?;
        let class = self
            .catalog
            .device_class(device.device_class_id)
            .ok_or(DeviceError::DeviceClassNotFound)?;
        let action_type = class
            .action_type(action.action_type_id)
            .ok_or(DeviceError::ActionTypeNotFound)?;
        let filled = verify_params(&action_type.param_types, &action.params, true)?;

        let mut action = action;
        action.params = filled;
        let deadline = self.deadline();
        let Some(plugin) = self.registry.get_mut(device.plugin_id) else {
            return Err(DeviceError::PluginNotFound);
        };
        match plugin.execute_action(device, &action)? {
            Completion::Done => Ok(Completion::Done),
            Completion::Pending => {
                self.pending_actions.insert(action.id, deadline);
                Ok(Completion::Pending)
            }
        }
    }

    // ── Removal ────────────────────────────────────────────────────

    /// Remove a configured device, notify its plugin, and delete its
    /// persisted settings.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::DeviceNotFound`] for an unknown id.
    pub fn remove_configured_device(&mut self, device_id: DeviceId) -> Result<(), DeviceError> {
        let Some(device) = self.devices.remove(&device_id) else {
            return Err(DeviceError::DeviceNotFound);
        };
        if let Some(plugin) = self.registry.get_mut(device.plugin_id) {
            plugin.device_removed(&device);
        }
        self.timer_users.retain(|id| *id != device_id);
        self.setup_deadlines.remove(&device_id);
        if let Err(err) = self.store.remove_device(device_id) {
            warn!(%err, "failed to remove persisted device settings");
        }
        Ok(())
    }

    // ── Hardware fan-out ───────────────────────────────────────────

    /// Fan one hardware event out to every subscribed plugin, in plugin
    /// registration order.
    pub fn dispatch_hardware_event(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::Radio433Data { raw } => {
                self.fan_out(HardwareResource::Radio433, |p| p.radio_data(&raw));
            }
            HardwareEvent::Radio868Data { raw } => {
                self.fan_out(HardwareResource::Radio868, |p| p.radio_data(&raw));
            }
            HardwareEvent::UpnpNotify { data } => {
                self.fan_out(HardwareResource::UpnpDiscovery, |p| {
                    p.upnp_notify_received(&data);
                });
            }
            HardwareEvent::UpnpDiscoveryFinished {
                plugin_id,
                descriptors,
            } => {
                // Discovery results go to the requesting plugin only.
                if let Some(plugin) = self.registry.get_mut(plugin_id) {
                    if plugin
                        .required_hardware()
                        .contains(HardwareResource::UpnpDiscovery)
                    {
                        plugin.upnp_discovery_finished(&descriptors);
                    }
                }
            }
            HardwareEvent::TimerTick => self.dispatch_timer_tick(),
        }
    }

    fn fan_out(
        &mut self,
        resource: HardwareResource,
        mut call: impl FnMut(&mut dyn DevicePlugin),
    ) {
        for plugin in self.registry.iter_mut() {
            if plugin.required_hardware().contains(resource) {
                call(plugin.as_mut());
            }
        }
    }

    /// Deliver one timer tick to every plugin owning a timer-requiring
    /// configured device. No-op while no such device exists.
    pub fn dispatch_timer_tick(&mut self) {
        if self.timer_users.is_empty() {
            return;
        }
        let owners: HashSet<PluginId> = self
            .timer_users
            .iter()
            .filter_map(|id| self.devices.get(id).map(|d| d.plugin_id))
            .collect();
        for plugin in self.registry.iter_mut() {
            let id = plugin.plugin_id();
            if owners.contains(&id)
                && plugin.required_hardware().contains(HardwareResource::Timer)
            {
                plugin.timer_tick();
            }
        }
    }

    // ── Plugin signals ─────────────────────────────────────────────

    /// Process one queued plugin signal.
    ///
    /// Unsolicited or malformed signals are logged and dropped; they never
    /// corrupt manager state.
    pub fn handle_signal(&mut self, signal: PluginSignal) {
        let PluginSignal { plugin_id, kind } = signal;
        match kind {
            PluginSignalKind::DevicesDiscovered {
                device_class_id,
                descriptors,
            } => self.handle_devices_discovered(plugin_id, device_class_id, descriptors),
            PluginSignalKind::DeviceSetupFinished { device_id, status } => {
                self.handle_setup_finished(plugin_id, device_id, status);
            }
            PluginSignalKind::PairingFinished {
                transaction_id,
                status,
            } => self.handle_pairing_finished(plugin_id, transaction_id, status),
            PluginSignalKind::ActionExecutionFinished { action_id, result } => {
                self.handle_action_finished(plugin_id, action_id, result);
            }
            PluginSignalKind::AutoDevicesAppeared {
                device_class_id,
                descriptors,
            } => self.handle_auto_devices_appeared(plugin_id, device_class_id, descriptors),
            PluginSignalKind::EventEmitted { event } => self.handle_event_emitted(event),
            PluginSignalKind::StateValueChanged {
                device_id,
                state_type_id,
                value,
            } => self.handle_state_value_changed(plugin_id, device_id, state_type_id, value),
        }
    }

    fn handle_devices_discovered(
        &mut self,
        plugin_id: PluginId,
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    ) {
        self.discovering
            .retain(|run| !(run.plugin_id == plugin_id && run.device_class_id == device_class_id));
        // A new cycle evicts the previous candidate batch for this class.
        self.discovered.retain(|_, c| c.device_class_id != device_class_id);
        for descriptor in &descriptors {
            self.discovered.insert(
                descriptor.id,
                DiscoveredCandidate {
                    device_class_id,
                    descriptor: descriptor.clone(),
                },
            );
        }
        self.publish(Notification::DevicesDiscovered {
            device_class_id,
            descriptors,
        });
    }

    fn handle_setup_finished(
        &mut self,
        plugin_id: PluginId,
        device_id: DeviceId,
        status: SetupStatus,
    ) {
        if status == SetupStatus::Async {
            warn!(device = %device_id, "setup finished with non-terminal status, dropping");
            return;
        }

        if let Some(device) = self.provisional.remove(&device_id) {
            if device.plugin_id != plugin_id {
                warn!(device = %device_id, "setup finished from the wrong plugin, dropping");
                self.provisional.insert(device_id, device);
                return;
            }
            self.setup_deadlines.remove(&device_id);
            if status == SetupStatus::Failure {
                warn!(device = %device_id, "device setup failed, not adding device");
                self.publish(Notification::DeviceSetupFinished {
                    device_id,
                    result: Err(DeviceError::SetupFailed),
                });
            } else {
                self.devices.insert(device_id, device);
                self.finish_setup_success(device_id, true);
            }
            return;
        }

        if let Some(device) = self.devices.get(&device_id) {
            if device.setup_complete {
                warn!(device = %device_id, "device has been set up before, dropping");
                return;
            }
            if device.plugin_id != plugin_id {
                warn!(device = %device_id, "setup finished from the wrong plugin, dropping");
                return;
            }
            self.setup_deadlines.remove(&device_id);
            if status == SetupStatus::Failure {
                warn!(device = %device_id, "device setup failed, device not functional");
                self.publish(Notification::DeviceSetupFinished {
                    device_id,
                    result: Err(DeviceError::SetupFailed),
                });
            } else {
                self.finish_setup_success(device_id, false);
            }
            return;
        }

        warn!(device = %device_id, "setup finished for an unknown device, dropping");
    }

    fn handle_pairing_finished(
        &mut self,
        plugin_id: PluginId,
        transaction_id: PairingTransactionId,
        status: SetupStatus,
    ) {
        if status == SetupStatus::Async {
            warn!(plugin = %plugin_id, "pairing finished with non-terminal status, dropping");
            return;
        }
        let record = if let Some(pairing) = self.pairings_just_add.remove(&transaction_id) {
            Some((pairing.device_class_id, pairing.params))
        } else {
            self.pairings_discovery
                .remove(&transaction_id)
                .map(|pairing| (pairing.device_class_id, pairing.descriptor.params))
        };
        self.pairing_deadlines.remove(&transaction_id);
        let Some((device_class_id, params)) = record else {
            warn!(plugin = %plugin_id, "pairing finished without a waiting transaction, dropping");
            return;
        };

        if status == SetupStatus::Failure {
            self.publish(Notification::PairingFinished {
                transaction_id,
                result: Err(DeviceError::SetupFailed),
                device_id: None,
            });
            return;
        }
        self.conclude_pairing(transaction_id, device_class_id, params);
    }

    fn handle_action_finished(
        &mut self,
        plugin_id: PluginId,
        action_id: ActionId,
        result: Result<(), DeviceError>,
    ) {
        if self.pending_actions.remove(&action_id).is_none() {
            warn!(plugin = %plugin_id, action = %action_id, "action finished without a pending execution, dropping");
            return;
        }
        self.publish(Notification::ActionExecutionFinished { action_id, result });
    }

    fn handle_auto_devices_appeared(
        &mut self,
        plugin_id: PluginId,
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    ) {
        let Some(class) = self.catalog.device_class(device_class_id).cloned() else {
            warn!(class = %device_class_id, "auto devices for an unknown class, dropping");
            return;
        };
        if !class.create_methods.contains(CreateMethod::Auto) {
            warn!(class = %class.name, "auto devices for a class without the auto create method, dropping");
            return;
        }
        if class.plugin_id != plugin_id {
            warn!(class = %class.name, "auto devices from the wrong plugin, dropping");
            return;
        }
        if !self.registry.contains(class.plugin_id) {
            warn!(plugin = %class.plugin_id, "auto devices for an unloaded plugin, dropping");
            return;
        }

        for descriptor in descriptors {
            let device_id = DeviceId::new();
            let mut device =
                Device::new(device_id, device_class_id, class.plugin_id, class.name.clone());
            device.params = descriptor.params;
            match self.run_setup(&mut device) {
                SetupStatus::Failure => {
                    warn!(device = %device_id, "device setup failed, not adding device");
                    self.publish(Notification::DeviceSetupFinished {
                        device_id,
                        result: Err(DeviceError::SetupFailed),
                    });
                }
                SetupStatus::Async => {
                    self.setup_deadlines.insert(device_id, self.deadline());
                    self.provisional.insert(device_id, device);
                }
                SetupStatus::Success => {
                    self.devices.insert(device_id, device);
                    self.finish_setup_success(device_id, true);
                }
            }
        }
    }

    fn handle_event_emitted(&mut self, event: Event) {
        self.publish(Notification::EventTriggered { event });
    }

    fn handle_state_value_changed(
        &mut self,
        plugin_id: PluginId,
        device_id: DeviceId,
        state_type_id: StateTypeId,
        value: ParamValue,
    ) {
        let Some(device) = self.devices.get_mut(&device_id) else {
            warn!(device = %device_id, "state change for an unknown device, dropping");
            return;
        };
        if device.plugin_id != plugin_id {
            warn!(device = %device_id, "state change from the wrong plugin, dropping");
            return;
        }
        if !device.set_state_value(state_type_id, value.clone()) {
            warn!(device = %device_id, state = %state_type_id, "state change for an unknown state type, dropping");
            return;
        }
        // Published as an atomic pair, state change first.
        self.publish(Notification::DeviceStateChanged {
            device_id,
            state_type_id,
            value: value.clone(),
        });
        self.publish(Notification::EventTriggered {
            event: Event::state_change(state_type_id, device_id, value),
        });
    }

    // ── Transaction expiry ─────────────────────────────────────────

    /// Purge every in-flight transaction whose deadline has passed,
    /// publishing synthetic failures on the plugins' behalf. Late plugin
    /// signals for purged transactions are dropped as unsolicited.
    pub fn expire_transactions(&mut self, now: Timestamp) {
        let expired: Vec<_> = self
            .discovering
            .iter()
            .filter(|run| run.deadline <= now)
            .map(|run| (run.plugin_id, run.device_class_id))
            .collect();
        self.discovering.retain(|run| run.deadline > now);
        for (plugin_id, device_class_id) in expired {
            warn!(plugin = %plugin_id, "discovery timed out");
            self.publish(Notification::DevicesDiscovered {
                device_class_id,
                descriptors: Vec::new(),
            });
        }

        let expired: Vec<_> = self
            .setup_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for device_id in expired {
            self.setup_deadlines.remove(&device_id);
            self.provisional.remove(&device_id);
            warn!(device = %device_id, "device setup timed out");
            self.publish(Notification::DeviceSetupFinished {
                device_id,
                result: Err(DeviceError::SetupFailed),
            });
        }

        let expired: Vec<_> = self
            .pairing_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for transaction_id in expired {
            self.remove_pairing(transaction_id);
            warn!(transaction = %transaction_id, "pairing timed out");
            self.publish(Notification::PairingFinished {
                transaction_id,
                result: Err(DeviceError::SetupFailed),
                device_id: None,
            });
        }

        let expired: Vec<_> = self
            .pending_actions
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for action_id in expired {
            self.pending_actions.remove(&action_id);
            warn!(action = %action_id, "action execution timed out");
            self.publish(Notification::ActionExecutionFinished {
                action_id,
                result: Err(DeviceError::HardwareFailure),
            });
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Initialize states from the class defaults and invoke the plugin's
    /// setup slot.
    fn run_setup(&mut self, device: &mut Device) -> SetupStatus {
        let Some(class) = self.catalog.device_class(device.device_class_id) else {
            warn!(device = %device.id, "no device class for device");
            return SetupStatus::Failure;
        };
        device.init_states(class);
        let Some(plugin) = self.registry.get_mut(device.plugin_id) else {
            warn!(device = %device.id, "no plugin for device");
            return SetupStatus::Failure;
        };
        plugin.setup_device(device)
    }

    /// Terminal success of a setup attempt: mark the device, register it
    /// with the timer if its plugin asked for one, persist, publish.
    fn finish_setup_success(&mut self, device_id: DeviceId, persist: bool) {
        if let Some(device) = self.devices.get_mut(&device_id) {
            device.setup_complete = true;
        }
        let requires_timer = self
            .devices
            .get(&device_id)
            .and_then(|d| self.registry.get(d.plugin_id))
            .map(|p| p.required_hardware().contains(HardwareResource::Timer))
            .unwrap_or(false);
        if requires_timer {
            let first = self.timer_users.is_empty();
            self.timer_users.push(device_id);
            if first {
                // One immediate tick so plugins can initialize.
                self.dispatch_timer_tick();
            }
        }
        if persist {
            self.persist_devices();
        }
        self.publish(Notification::DeviceSetupFinished {
            device_id,
            result: Ok(()),
        });
    }

    fn persist_devices(&mut self) {
        if let Err(err) = self.store.store_devices(self.devices.values()) {
            warn!(%err, "failed to persist configured devices");
        }
    }

    fn deadline(&self) -> Timestamp {
        let millis = i64::try_from(self.config.transaction_timeout.as_millis()).unwrap_or(i64::MAX);
        now() + chrono::Duration::milliseconds(millis)
    }

    fn publish(&self, notification: Notification) {
        self.notifications.publish(notification);
    }
}
