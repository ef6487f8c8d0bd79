//! Shared hardware events fanned out to subscribing plugins.
//!
//! The radio and UPnP sources are process-wide singletons owned by the
//! host; the periodic timer is driven by the dispatcher loop. Whatever the
//! source, the host feeds its events into
//! [`DeviceManager::dispatch_hardware_event`](crate::manager::DeviceManager::dispatch_hardware_event),
//! which computes the fan-out set.

use serde::{Deserialize, Serialize};

use hearth_domain::id::PluginId;

/// A device found by a UPnP discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpnpDescriptor {
    /// Description URL from the `LOCATION` header.
    pub location: String,
    /// `SERVER` header value.
    pub server: String,
    /// Unique service name.
    pub usn: String,
}

/// One inbound event from a shared hardware source.
#[derive(Debug, Clone)]
pub enum HardwareEvent {
    /// A raw frame from the 433 MHz radio.
    Radio433Data { raw: Vec<i32> },
    /// A raw frame from the 868 MHz radio.
    Radio868Data { raw: Vec<i32> },
    /// A UPnP discovery run requested by `plugin_id` finished.
    UpnpDiscoveryFinished {
        plugin_id: PluginId,
        descriptors: Vec<UpnpDescriptor>,
    },
    /// An unsolicited UPnP NOTIFY datagram.
    UpnpNotify { data: Vec<u8> },
    /// The periodic timer fired.
    TimerTick,
}
