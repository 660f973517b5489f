//! Entity state storage
//!
//! The StateStore holds the rendered state of every entity and fires
//! `state_changed` on the event bus for each write and removal.

use dashmap::DashMap;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::{Context, EventBus, State, EVENT_STATE_CHANGED};

/// The state store tracks all entity states
pub struct StateStore {
    /// All entity states keyed by entity_id
    states: DashMap<String, State>,
    /// Event bus for firing state change events
    event_bus: Arc<EventBus>,
}

impl StateStore {
    /// Create a new state store firing on the given event bus
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Set the state of an entity
    ///
    /// If the entity already has a state, the `last_changed` timestamp will
    /// only be updated if the state value actually changed.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: &str,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let old_state = self.states.get(entity_id).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id, state, attributes, context.clone()),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting entity state"
        );

        self.states.insert(entity_id.to_string(), new_state.clone());

        self.event_bus.fire_with_context(
            EVENT_STATE_CHANGED,
            json!({
                "entity_id": entity_id,
                "old_state": old_state,
                "new_state": new_state,
            }),
            context,
        );

        new_state
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value as a string, or None if entity doesn't exist
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Check if an entity is in a specific state
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    /// Get all states for a domain
    pub fn domain_states(&self, domain: &str) -> Vec<State> {
        self.states
            .iter()
            .filter(|r| r.value().domain() == domain)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Get all states
    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity's state
    ///
    /// Fires `state_changed` with the old state and a null new state.
    #[instrument(skip(self, context))]
    pub fn remove(&self, entity_id: &str, context: Context) -> Option<State> {
        let old_state = self.states.remove(entity_id).map(|(_, s)| s);

        if let Some(ref state) = old_state {
            trace!("Removing entity state");
            self.event_bus.fire_with_context(
                EVENT_STATE_CHANGED,
                json!({
                    "entity_id": entity_id,
                    "old_state": state,
                    "new_state": null,
                }),
                context,
            );
        }

        old_state
    }

    /// Get the total number of entities with a state
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;
