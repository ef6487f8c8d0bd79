//! Actions — imperative requests against a device.

use serde::{Deserialize, Serialize};

use crate::id::{ActionId, ActionTypeId, DeviceId};
use crate::params::Param;

/// A single execution request against a device.
///
/// The `id` identifies this execution: an asynchronous plugin completes it
/// later with a matching `action_execution_finished` signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub device_id: DeviceId,
    pub action_type_id: ActionTypeId,
    pub params: Vec<Param>,
}

impl Action {
    /// Create an action with a fresh execution id.
    #[must_use]
    pub fn new(device_id: DeviceId, action_type_id: ActionTypeId, params: Vec<Param>) -> Self {
        Self {
            id: ActionId::new(),
            device_id,
            action_type_id,
            params,
        }
    }

    /// The same request under a fresh execution id.
    ///
    /// Used when a stored action (e.g. in a rule) is dispatched again.
    #[must_use]
    pub fn reissued(&self) -> Self {
        Self {
            id: ActionId::new(),
            ..self.clone()
        }
    }
}
