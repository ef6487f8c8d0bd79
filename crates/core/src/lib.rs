//! # hearth-core
//!
//! Application layer — the device manager and the **port definitions**
//! (traits) the rest of the daemon plugs into.
//!
//! ## Responsibilities
//! - Define **ports** that adapters implement (driven/outbound):
//!   - [`ports::plugin::DevicePlugin`] — the device-plugin contract
//!   - [`ports::settings::SettingsStore`] — grouped key/value persistence
//!   - [`ports::provider::PluginProvider`] — "produce plugin instances
//!     with metadata"
//! - Drive the device lifecycle: discovery, pairing, setup, actions,
//!   removal ([`manager::DeviceManager`])
//! - Fan shared hardware events out to subscribing plugins ([`hardware`])
//! - Publish notifications on the event channel ([`event_bus`])
//! - Evaluate trigger → action rules ([`rules`])
//! - Persist configured devices and plugin configs ([`storage`])
//! - Run the cooperative dispatcher loop ([`runtime`])
//!
//! ## Dependency rule
//! Depends on `hearth-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod catalog;
pub mod event_bus;
pub mod hardware;
pub mod manager;
pub mod ports;
pub mod registry;
pub mod rules;
pub mod runtime;
pub mod storage;
