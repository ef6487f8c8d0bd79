//! The notification channel — publishes manager events to subscribers.
//!
//! The JSON-RPC layer, the rule wiring, and monitoring interfaces all
//! subscribe here. Backed by a tokio [`broadcast`] channel: publishing
//! succeeds even with no subscribers (the notification is simply dropped).

use tokio::sync::broadcast;

use hearth_domain::device::DeviceDescriptor;
use hearth_domain::error::DeviceError;
use hearth_domain::event::Event;
use hearth_domain::id::{
    ActionId, DeviceClassId, DeviceId, PairingTransactionId, StateTypeId,
};
use hearth_domain::params::ParamValue;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// A notification published by the device manager.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Plugins and configured devices are loaded.
    Loaded,
    /// A device setup attempt reached a terminal outcome.
    DeviceSetupFinished {
        device_id: DeviceId,
        result: Result<(), DeviceError>,
    },
    /// A discovery run finished with these candidates.
    DevicesDiscovered {
        device_class_id: DeviceClassId,
        descriptors: Vec<DeviceDescriptor>,
    },
    /// A device state changed; the matching [`Notification::EventTriggered`]
    /// follows immediately.
    DeviceStateChanged {
        device_id: DeviceId,
        state_type_id: StateTypeId,
        value: ParamValue,
    },
    /// A domain event occurred — the input to rule evaluation.
    EventTriggered { event: Event },
    /// A pairing transaction reached a terminal outcome. On success,
    /// `device_id` names the device whose setup is under way.
    PairingFinished {
        transaction_id: PairingTransactionId,
        result: Result<(), DeviceError>,
        device_id: Option<DeviceId>,
    },
    /// An asynchronous action execution completed.
    ActionExecutionFinished {
        action_id: ActionId,
        result: Result<(), DeviceError>,
    },
}

/// Broadcast channel for [`Notification`]s.
#[derive(Debug)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to notifications published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers.
    pub fn publish(&self, notification: Notification) {
        // send fails only with zero receivers, which is fine.
        let _ = self.sender.send(notification);
    }
}
