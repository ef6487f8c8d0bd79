//! Persistence of configured devices and plugin configs over the
//! settings port.
//!
//! Layout of the settings tree:
//!
//! ```text
//! DeviceConfig / <deviceId> / devicename, deviceClassId, pluginid
//! DeviceConfig / <deviceId> / Params / <paramName> = <value>
//! PluginConfig / <pluginId> / <paramName> = <value>
//! ```
//!
//! Param values are stored in their tagged JSON form, so a stored list
//! loads back exactly as it was verified.

use std::str::FromStr;

use hearth_domain::device::Device;
use hearth_domain::id::{DeviceClassId, DeviceId, PluginId};
use hearth_domain::params::{Param, ParamValue};

use crate::ports::settings::{SettingsError, SettingsStore};

const DEVICE_GROUP: &str = "DeviceConfig";
const PLUGIN_GROUP: &str = "PluginConfig";
const PARAMS_GROUP: &str = "Params";

/// One persisted device record, as loaded at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub name: String,
    pub device_class_id: DeviceClassId,
    pub plugin_id: PluginId,
    pub params: Vec<Param>,
}

/// Loads and stores device records and plugin configs through an injected
/// [`SettingsStore`].
#[derive(Debug)]
pub struct DeviceStore<S> {
    settings: S,
}

impl<S: SettingsStore> DeviceStore<S> {
    #[must_use]
    pub fn new(settings: S) -> Self {
        Self { settings }
    }

    /// Load every persisted device record. Corrupt entries are skipped
    /// with a warning rather than failing the whole load.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    pub fn load_devices(&self) -> Result<Vec<DeviceRecord>, SettingsError> {
        let mut records = Vec::new();
        for group in self.settings.child_groups(&[DEVICE_GROUP])? {
            match self.load_device(&group)? {
                Some(record) => records.push(record),
                None => tracing::warn!(group, "skipping corrupt device record"),
            }
        }
        Ok(records)
    }

    fn load_device(&self, group: &str) -> Result<Option<DeviceRecord>, SettingsError> {
        let Ok(id) = DeviceId::from_str(group) else {
            return Ok(None);
        };
        let path = [DEVICE_GROUP, group];
        let Some(name) = self.read_string(&path, "devicename")? else {
            return Ok(None);
        };
        let Some(class) = self.read_string(&path, "deviceClassId")? else {
            return Ok(None);
        };
        let Some(plugin) = self.read_string(&path, "pluginid")? else {
            return Ok(None);
        };
        let (Ok(device_class_id), Ok(plugin_id)) =
            (DeviceClassId::from_str(&class), PluginId::from_str(&plugin))
        else {
            return Ok(None);
        };

        let params_path = [DEVICE_GROUP, group, PARAMS_GROUP];
        let params = self.load_params(&params_path)?;

        Ok(Some(DeviceRecord {
            id,
            name,
            device_class_id,
            plugin_id,
            params,
        }))
    }

    /// Persist the whole configured-device set.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    pub fn store_devices<'a, I>(&mut self, devices: I) -> Result<(), SettingsError>
    where
        I: IntoIterator<Item = &'a Device>,
    {
        for device in devices {
            let id = device.id.to_string();
            let path = [DEVICE_GROUP, id.as_str()];
            self.settings
                .set(&path, "devicename", serde_json::Value::String(device.name.clone()))?;
            self.settings.set(
                &path,
                "deviceClassId",
                serde_json::Value::String(device.device_class_id.to_string()),
            )?;
            self.settings.set(
                &path,
                "pluginid",
                serde_json::Value::String(device.plugin_id.to_string()),
            )?;
            let params_path = [DEVICE_GROUP, id.as_str(), PARAMS_GROUP];
            self.store_params(&params_path, &device.params)?;
        }
        Ok(())
    }

    /// Delete the persisted settings group of one device.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<(), SettingsError> {
        let id = id.to_string();
        self.settings.remove_group(&[DEVICE_GROUP, id.as_str()])
    }

    /// Load a plugin's stored configuration; empty when none is stored.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    pub fn load_plugin_config(&self, id: PluginId) -> Result<Vec<Param>, SettingsError> {
        let id = id.to_string();
        self.load_params(&[PLUGIN_GROUP, id.as_str()])
    }

    /// Persist a plugin's configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    pub fn store_plugin_config(&mut self, id: PluginId, params: &[Param]) -> Result<(), SettingsError> {
        let id = id.to_string();
        self.store_params(&[PLUGIN_GROUP, id.as_str()], params)
    }

    fn read_string(&self, path: &[&str], key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self
            .settings
            .get(path, key)?
            .and_then(|v| v.as_str().map(ToOwned::to_owned)))
    }

    fn load_params(&self, path: &[&str]) -> Result<Vec<Param>, SettingsError> {
        let mut params = Vec::new();
        for key in self.settings.keys(path)? {
            let Some(value) = self.settings.get(path, &key)? else {
                continue;
            };
            match serde_json::from_value::<ParamValue>(value) {
                Ok(value) => params.push(Param::new(key, value)),
                Err(err) => tracing::warn!(param = key, %err, "skipping corrupt param value"),
            }
        }
        Ok(params)
    }

    fn store_params(&mut self, path: &[&str], params: &[Param]) -> Result<(), SettingsError> {
        for param in params {
            let value = serde_json::to_value(&param.value)
                .map_err(|err| SettingsError::Corrupt(err.to_string()))?;
            self.settings.set(path, &param.name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_domain::params::ParamValue;

    use crate::ports::settings::MemorySettings;

    fn device(name: &str) -> Device {
        let mut device = Device::new(
            DeviceId::new(),
            DeviceClassId::new(),
            PluginId::new(),
            name,
        );
        device.params = vec![
            Param::new("host", ParamValue::String("10.0.0.5".into())),
            Param::new("port", ParamValue::Int(80)),
        ];
        device
    }

    #[test]
    fn should_roundtrip_devices_through_the_store() {
        let mut store = DeviceStore::new(MemorySettings::new());
        let a = device("Lamp");
        let b = device("Socket");

        store.store_devices([&a, &b]).unwrap();
        let mut records = store.load_devices().unwrap();
        records.sort_by_key(|r| r.name.clone());

        assert_eq!(records.len(), 2);
        let lamp = records.iter().find(|r| r.name == "Lamp").unwrap();
        assert_eq!(lamp.id, a.id);
        assert_eq!(lamp.device_class_id, a.device_class_id);
        assert_eq!(lamp.plugin_id, a.plugin_id);
        let mut params = lamp.params.clone();
        params.sort_by_key(|p| p.name.clone());
        assert_eq!(
            params,
            vec![
                Param::new("host", ParamValue::String("10.0.0.5".into())),
                Param::new("port", ParamValue::Int(80)),
            ]
        );
    }

    #[test]
    fn should_remove_device_group() {
        let mut store = DeviceStore::new(MemorySettings::new());
        let a = device("Lamp");

        store.store_devices([&a]).unwrap();
        store.remove_device(a.id).unwrap();

        assert!(store.load_devices().unwrap().is_empty());
    }

    #[test]
    fn should_skip_group_that_is_not_a_uuid() {
        let mut settings = MemorySettings::new();
        settings
            .set(&["DeviceConfig", "not-a-uuid"], "devicename", serde_json::json!("X"))
            .unwrap();

        let store = DeviceStore::new(settings);
        assert!(store.load_devices().unwrap().is_empty());
    }

    #[test]
    fn should_skip_record_with_missing_fields() {
        let id = DeviceId::new().to_string();
        let mut settings = MemorySettings::new();
        settings
            .set(&["DeviceConfig", id.as_str()], "devicename", serde_json::json!("X"))
            .unwrap();

        let store = DeviceStore::new(settings);
        assert!(store.load_devices().unwrap().is_empty());
    }

    #[test]
    fn should_roundtrip_plugin_config() {
        let mut store = DeviceStore::new(MemorySettings::new());
        let plugin_id = PluginId::new();
        let params = vec![Param::new("interval", ParamValue::Uint(30))];

        store.store_plugin_config(plugin_id, &params).unwrap();
        let loaded = store.load_plugin_config(plugin_id).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn should_return_empty_config_when_none_stored() {
        let store = DeviceStore::new(MemorySettings::new());
        assert!(store.load_plugin_config(PluginId::new()).unwrap().is_empty());
    }
}
