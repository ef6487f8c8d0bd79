//! The plugin registry — loaded plugins in registration order.
//!
//! Registration order is observable: it is the fan-out order for hardware
//! events, so the registry keeps plugins in an ordered table with an id
//! index on the side.

use std::collections::HashMap;

use hearth_domain::id::PluginId;

use crate::ports::plugin::DevicePlugin;

/// Owns every loaded plugin for the daemon's lifetime.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DevicePlugin>>,
    index: HashMap<PluginId, usize>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin at the end of the fan-out order. Returns `false` on a
    /// duplicate plugin id.
    pub fn insert(&mut self, plugin: Box<dyn DevicePlugin>) -> bool {
        let id = plugin.plugin_id();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.plugins.len());
        self.plugins.push(plugin);
        true
    }

    #[must_use]
    pub fn contains(&self, id: PluginId) -> bool {
        self.index.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: PluginId) -> Option<&dyn DevicePlugin> {
        self.index.get(&id).map(|i| self.plugins[*i].as_ref())
    }

    #[must_use]
    pub fn get_mut(&mut self, id: PluginId) -> Option<&mut Box<dyn DevicePlugin>> {
        let i = *self.index.get(&id)?;
        self.plugins.get_mut(i)
    }

    /// Iterate plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn DevicePlugin>> {
        self.plugins.iter()
    }

    /// Iterate plugins mutably in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn DevicePlugin>> {
        self.plugins.iter_mut()
    }

    /// Plugin ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<PluginId> {
        self.plugins.iter().map(|p| p.plugin_id()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
