//! Plugin loader port — "produce a sequence of plugin instances with
//! metadata".
//!
//! The real loader (shared objects, static registration, …) lives outside
//! the core. Whatever it is, it hands the manager packages of metadata plus
//! a boxed plugin; packages with incomplete metadata are refused at load.

use crate::ports::plugin::DevicePlugin;

/// One loadable plugin together with its metadata file contents.
pub struct PluginPackage {
    /// Parsed metadata JSON. Must carry the top-level fields `name`, `id`,
    /// and `vendors`.
    pub metadata: serde_json::Value,
    pub plugin: Box<dyn DevicePlugin>,
}

/// Produces the plugins to register.
pub trait PluginProvider {
    fn load(&mut self) -> Vec<PluginPackage>;
}

const REQUIRED_METADATA_FIELDS: [&str; 3] = ["name", "id", "vendors"];

/// The first required metadata field missing from `metadata`, if any.
#[must_use]
pub fn missing_metadata_field(metadata: &serde_json::Value) -> Option<&'static str> {
    REQUIRED_METADATA_FIELDS
        .into_iter()
        .find(|field| metadata.get(field).is_none())
}
