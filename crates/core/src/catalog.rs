//! The catalog — registry of vendors and device classes.

use std::collections::HashMap;

use hearth_domain::device_class::{DeviceClass, Vendor};
use hearth_domain::id::{DeviceClassId, EventTypeId, VendorId};

/// Registry of everything the loaded plugins declared: vendors, device
/// classes, and through them the action/state/event types.
#[derive(Debug, Default)]
pub struct Catalog {
    vendors: HashMap<VendorId, Vendor>,
    device_classes: HashMap<DeviceClassId, DeviceClass>,
    vendor_classes: HashMap<VendorId, Vec<DeviceClassId>>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vendor. Returns `false` on a duplicate id, in which case
    /// the existing entry wins.
    pub fn add_vendor(&mut self, vendor: Vendor) -> bool {
        if self.vendors.contains_key(&vendor.id) {
            return false;
        }
        self.vendors.insert(vendor.id, vendor);
        true
    }

    /// Register a device class. Returns `false` when the class's vendor is
    /// unknown or the class id is already taken.
    pub fn add_device_class(&mut self, class: DeviceClass) -> bool {
        if !self.vendors.contains_key(&class.vendor_id)
            || self.device_classes.contains_key(&class.id)
        {
            return false;
        }
        self.vendor_classes.entry(class.vendor_id).or_default().push(class.id);
        self.device_classes.insert(class.id, class);
        true
    }

    #[must_use]
    pub fn vendors(&self) -> Vec<Vendor> {
        self.vendors.values().cloned().collect()
    }

    #[must_use]
    pub fn device_class(&self, id: DeviceClassId) -> Option<&DeviceClass> {
        self.device_classes.get(&id)
    }

    /// All device classes, optionally filtered by vendor.
    #[must_use]
    pub fn device_classes(&self, vendor_id: Option<VendorId>) -> Vec<DeviceClass> {
        match vendor_id {
            None => self.device_classes.values().cloned().collect(),
            Some(vendor_id) => self
                .vendor_classes
                .get(&vendor_id)
                .into_iter()
                .flatten()
                .filter_map(|id| self.device_classes.get(id).cloned())
                .collect(),
        }
    }

    /// Whether any class declares (or state-synthesizes) this event type.
    #[must_use]
    pub fn has_event_type(&self, id: EventTypeId) -> bool {
        self.device_classes.values().any(|c| c.has_event_type(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_domain::device_class::{CreateMethod, StateType};
    use hearth_domain::id::{PluginId, StateTypeId};
    use hearth_domain::params::ParamValue;

    fn vendor() -> Vendor {
        Vendor::new(VendorId::new(), "Acme")
    }

    fn class_for(vendor_id: VendorId) -> DeviceClass {
        DeviceClass::builder(DeviceClassId::new(), vendor_id, PluginId::new())
            .name("Lamp")
            .create_method(CreateMethod::User)
            .build()
    }

    #[test]
    fn should_register_vendor_and_class() {
        let mut catalog = Catalog::new();
        let vendor = vendor();
        let class = class_for(vendor.id);
        let class_id = class.id;

        assert!(catalog.add_vendor(vendor.clone()));
        assert!(catalog.add_device_class(class));

        assert_eq!(catalog.vendors().len(), 1);
        assert!(catalog.device_class(class_id).is_some());
    }

    #[test]
    fn should_refuse_duplicate_vendor() {
        let mut catalog = Catalog::new();
        let vendor = vendor();
        assert!(catalog.add_vendor(vendor.clone()));
        assert!(!catalog.add_vendor(Vendor::new(vendor.id, "Impostor")));
        assert_eq!(catalog.vendors()[0].name, "Acme");
    }

    #[test]
    fn should_refuse_class_with_unknown_vendor() {
        let mut catalog = Catalog::new();
        assert!(!catalog.add_device_class(class_for(VendorId::new())));
    }

    #[test]
    fn should_refuse_duplicate_class_id() {
        let mut catalog = Catalog::new();
        let vendor = vendor();
        catalog.add_vendor(vendor.clone());
        let class = class_for(vendor.id);
        assert!(catalog.add_device_class(class.clone()));
        assert!(!catalog.add_device_class(class));
    }

    #[test]
    fn should_filter_classes_by_vendor() {
        let mut catalog = Catalog::new();
        let acme = vendor();
        let other = Vendor::new(VendorId::new(), "Other");
        catalog.add_vendor(acme.clone());
        catalog.add_vendor(other.clone());
        catalog.add_device_class(class_for(acme.id));
        catalog.add_device_class(class_for(acme.id));
        catalog.add_device_class(class_for(other.id));

        assert_eq!(catalog.device_classes(None).len(), 3);
        assert_eq!(catalog.device_classes(Some(acme.id)).len(), 2);
        assert_eq!(catalog.device_classes(Some(other.id)).len(), 1);
        assert!(catalog.device_classes(Some(VendorId::new())).is_empty());
    }

    #[test]
    fn should_resolve_state_synthesized_event_types() {
        let mut catalog = Catalog::new();
        let vendor = vendor();
        catalog.add_vendor(vendor.clone());

        let state_id = StateTypeId::new();
        let class = DeviceClass::builder(DeviceClassId::new(), vendor.id, PluginId::new())
            .name("Sensor")
            .create_method(CreateMethod::User)
            .state_type(StateType::new(state_id, "temperature", ParamValue::Double(0.0)))
            .build();
        catalog.add_device_class(class);

        assert!(catalog.has_event_type(EventTypeId::from(state_id)));
        assert!(!catalog.has_event_type(EventTypeId::new()));
    }
}
