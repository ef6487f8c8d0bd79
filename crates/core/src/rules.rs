//! The minimal rule engine — trigger → action lookup.
//!
//! Deliberately shallow: a flat list of [`Rule`]s in insertion order, no
//! conditions, no effect sets. The dispatcher loop feeds triggered events
//! in and hands the returned actions to the device manager.

use hearth_domain::action::Action;
use hearth_domain::error::RuleError;
use hearth_domain::id::EventTypeId;
use hearth_domain::rule::Rule;

use crate::catalog::Catalog;

/// Maps trigger event types to the actions to execute.
#[derive(Debug, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. The trigger must resolve to an event type some
    /// loaded device class declares (or synthesizes from a state type).
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::NoSuchTrigger`] when no known event type
    /// matches the trigger id.
    pub fn add_rule(
        &mut self,
        trigger_event_type_id: EventTypeId,
        action: Action,
        catalog: &Catalog,
    ) -> Result<(), RuleError> {
        if !catalog.has_event_type(trigger_event_type_id) {
            return Err(RuleError::NoSuchTrigger);
        }
        self.rules.push(Rule::new(trigger_event_type_id, action));
        Ok(())
    }

    /// The actions of every rule whose trigger matches, in insertion order.
    #[must_use]
    pub fn evaluate_trigger(&self, event_type_id: EventTypeId) -> Vec<Action> {
        self.rules
            .iter()
            .filter(|r| r.trigger_event_type_id == event_type_id)
            .map(|r| r.action.clone())
            .collect()
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
