//! The error taxonomy shared across the workspace.
//!
//! Every fallible device operation reports a [`DeviceError`]. The original
//! taxonomy carried `NoError` and `Async` pseudo-variants; here success is
//! `Ok`, and "the plugin will complete this later" is the
//! [`Completion::Pending`] success value, so the enum contains only actual
//! failures.

use serde::{Deserialize, Serialize};

/// The closed set of failures that can happen when working with devices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DeviceError {
    // Lookup failures.
    #[error("no plugin found for the given id")]
    PluginNotFound,
    #[error("no device found for the given id")]
    DeviceNotFound,
    #[error("no device class found for the given id")]
    DeviceClassNotFound,
    #[error("no action type found for the given id")]
    ActionTypeNotFound,
    #[error("no state type found for the given id")]
    StateTypeNotFound,
    #[error("no event type found for the given id")]
    EventTypeNotFound,
    #[error("no device descriptor found for the given id")]
    DeviceDescriptorNotFound,
    #[error("no pairing transaction found for the given id")]
    PairingTransactionIdNotFound,

    // Input failures.
    #[error("a required parameter is missing")]
    MissingParameter,
    #[error("a supplied parameter is invalid")]
    InvalidParameter,

    // Setup failures.
    #[error("device setup failed")]
    SetupFailed,
    #[error("a device with this id already exists")]
    DuplicateUuid,
    #[error("the device class does not support this create method")]
    CreationMethodNotSupported,
    #[error("the device class does not support this setup method")]
    SetupMethodNotSupported,

    // Runtime failures.
    #[error("the required hardware is not available")]
    HardwareNotAvailable,
    #[error("the device hardware reported a failure")]
    HardwareFailure,
    #[error("the device is currently in use")]
    DeviceInUse,
}

/// Success value of operations that may finish later.
///
/// `Pending` is a promise: the plugin will deliver a matching completion
/// signal (setup finished, pairing finished, action finished, devices
/// discovered) through its emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The operation ran to completion synchronously.
    Done,
    /// The operation was accepted; a completion signal follows.
    Pending,
}

impl Completion {
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Tri-state result of a plugin setup or pairing-confirmation slot.
///
/// `Async` is only valid as the *immediate* return of the slot; a
/// completion signal must never carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    Success,
    Failure,
    Async,
}

/// Failures raised by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("no event type matches the given trigger id")]
    NoSuchTrigger,
}
