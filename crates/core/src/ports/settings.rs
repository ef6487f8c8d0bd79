//! Settings port — grouped key/value persistence.
//!
//! Groups form a tree addressed by string paths (`["DeviceConfig", "<id>",
//! "Params"]`); each group holds flat keys with JSON values. The store is
//! synchronous: the manager runs on a single-threaded dispatcher and never
//! suspends inside an operation.

use std::collections::BTreeMap;

/// Failures raised by a settings store.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings storage")]
    Io(#[from] std::io::Error),
    #[error("settings storage is corrupted: {0}")]
    Corrupt(String),
}

/// Grouped key/value persistence for device records and plugin configs.
pub trait SettingsStore: Send {
    /// List the names of the child groups under `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    fn child_groups(&self, path: &[&str]) -> Result<Vec<String>, SettingsError>;

    /// List the keys stored directly in the group at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    fn keys(&self, path: &[&str]) -> Result<Vec<String>, SettingsError>;

    /// Read one value, `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    fn get(&self, path: &[&str], key: &str) -> Result<Option<serde_json::Value>, SettingsError>;

    /// Write one value, creating intermediate groups as needed.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    fn set(&mut self, path: &[&str], key: &str, value: serde_json::Value)
        -> Result<(), SettingsError>;

    /// Remove a whole group, its keys, and its child groups.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the backing storage fails.
    fn remove_group(&mut self, path: &[&str]) -> Result<(), SettingsError>;
}

/// In-memory settings store.
///
/// Backs tests and ephemeral daemon runs; the file adapter provides the
/// durable implementation.
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    root: Group,
}

#[derive(Debug, Default, Clone)]
struct Group {
    keys: BTreeMap<String, serde_json::Value>,
    children: BTreeMap<String, Group>,
}

impl MemorySettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn group(&self, path: &[&str]) -> Option<&Group> {
        let mut group = &self.root;
        for segment in path {
            group = group.children.get(*segment)?;
        }
        Some(group)
    }

    fn group_mut(&mut self, path: &[&str]) -> &mut Group {
        let mut group = &mut self.root;
        for segment in path {
            group = group.children.entry((*segment).to_string()).or_default();
        }
        group
    }
}

impl SettingsStore for MemorySettings {
    fn child_groups(&self, path: &[&str]) -> Result<Vec<String>, SettingsError> {
        Ok(self
            .group(path)
            .map(|g| g.children.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn keys(&self, path: &[&str]) -> Result<Vec<String>, SettingsError> {
        Ok(self
            .group(path)
            .map(|g| g.keys.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn get(&self, path: &[&str], key: &str) -> Result<Option<serde_json::Value>, SettingsError> {
        Ok(self.group(path).and_then(|g| g.keys.get(key).cloned()))
    }

    fn set(
        &mut self,
        path: &[&str],
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SettingsError> {
        self.group_mut(path).keys.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_group(&mut self, path: &[&str]) -> Result<(), SettingsError> {
        match path.split_last() {
            Some((last, parent)) => {
                if let Some(group) = parent
                    .iter()
                    .try_fold(&mut self.root, |g, s| g.children.get_mut(*s))
                {
                    group.children.remove(*last);
                }
            }
            None => self.root = Group::default(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_none_for_absent_key() {
        let store = MemorySettings::new();
        assert!(store.get(&["A"], "missing").unwrap().is_none());
    }

    #[test]
    fn should_store_and_read_back_values() {
        let mut store = MemorySettings::new();
        store
            .set(&["DeviceConfig", "abc"], "devicename", serde_json::json!("Lamp"))
            .unwrap();

        let value = store.get(&["DeviceConfig", "abc"], "devicename").unwrap();
        assert_eq!(value, Some(serde_json::json!("Lamp")));
    }

    #[test]
    fn should_list_child_groups_sorted() {
        let mut store = MemorySettings::new();
        store.set(&["DeviceConfig", "b"], "k", serde_json::json!(1)).unwrap();
        store.set(&["DeviceConfig", "a"], "k", serde_json::json!(2)).unwrap();

        let groups = store.child_groups(&["DeviceConfig"]).unwrap();
        assert_eq!(groups, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn should_list_keys_in_group() {
        let mut store = MemorySettings::new();
        store.set(&["PluginConfig", "p"], "host", serde_json::json!("h")).unwrap();
        store.set(&["PluginConfig", "p"], "port", serde_json::json!(80)).unwrap();

        let keys = store.keys(&["PluginConfig", "p"]).unwrap();
        assert_eq!(keys, vec!["host".to_string(), "port".to_string()]);
    }

    #[test]
    fn should_remove_group_with_children() {
        let mut store = MemorySettings::new();
        store
            .set(&["DeviceConfig", "abc", "Params"], "host", serde_json::json!("h"))
            .unwrap();
        store
            .set(&["DeviceConfig", "abc"], "devicename", serde_json::json!("Lamp"))
            .unwrap();

        store.remove_group(&["DeviceConfig", "abc"]).unwrap();

        assert!(store.child_groups(&["DeviceConfig"]).unwrap().is_empty());
        assert!(store.get(&["DeviceConfig", "abc"], "devicename").unwrap().is_none());
    }

    #[test]
    fn should_tolerate_removing_absent_group() {
        let mut store = MemorySettings::new();
        assert!(store.remove_group(&["nope", "nothing"]).is_ok());
    }
}
