//! Rules — the trigger → action pairs the minimal rule engine stores.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::id::EventTypeId;

/// One trigger → action pair.
///
/// Intentionally flat: conditions, state-change deltas, and effect sets
/// belong to a richer engine outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub trigger_event_type_id: EventTypeId,
    pub action: Action,
}

impl Rule {
    #[must_use]
    pub fn new(trigger_event_type_id: EventTypeId, action: Action) -> Self {
        Self {
            trigger_event_type_id,
            action,
        }
    }
}
