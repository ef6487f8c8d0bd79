//! Shared hardware resources plugins can subscribe to.

use serde::{Deserialize, Serialize};

/// A shared input source fanned out to subscribing plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareResource {
    /// The 433 MHz radio.
    Radio433,
    /// The 868 MHz radio.
    Radio868,
    /// The global periodic timer. Plugins must not create their own timers.
    Timer,
    /// UPnP discovery on the local network.
    UpnpDiscovery,
    /// Network connectivity change notifications.
    NetworkManager,
    /// The Bluetooth controller.
    Bluetooth,
}

const ALL_RESOURCES: [HardwareResource; 6] = [
    HardwareResource::Radio433,
    HardwareResource::Radio868,
    HardwareResource::Timer,
    HardwareResource::UpnpDiscovery,
    HardwareResource::NetworkManager,
    HardwareResource::Bluetooth,
];

const fn bit(resource: HardwareResource) -> u8 {
    1 << resource as u8
}

/// A typed set of [`HardwareResource`]s, as declared by a plugin.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(from = "Vec<HardwareResource>", into = "Vec<HardwareResource>")]
pub struct HardwareResources(u8);

impl HardwareResources {
    /// The empty set.
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// The set extended by one resource.
    #[must_use]
    pub const fn with(self, resource: HardwareResource) -> Self {
        Self(self.0 | bit(resource))
    }

    #[must_use]
    pub const fn contains(self, resource: HardwareResource) -> bool {
        self.0 & bit(resource) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the member resources in declaration order.
    pub fn iter(self) -> impl Iterator<Item = HardwareResource> {
        ALL_RESOURCES.into_iter().filter(move |r| self.contains(*r))
    }
}

impl From<Vec<HardwareResource>> for HardwareResources {
    fn from(resources: Vec<HardwareResource>) -> Self {
        resources.into_iter().collect()
    }
}

impl From<HardwareResources> for Vec<HardwareResource> {
    fn from(set: HardwareResources) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<HardwareResource> for HardwareResources {
    fn from_iter<I: IntoIterator<Item = HardwareResource>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}
