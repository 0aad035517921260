//! Builder for parent-linked execution histories.

use crate::history::{
    EventId, EventType, ExecutionErrorDetails, ExecutionEvent, MapIterationDetails, MapStartedDetails, StateDetails,
};
use chrono::DateTime;

/// First timestamp handed out, 2024-01-01T00:00:00Z.
const EPOCH_SECONDS: i64 = 1_704_067_200;

/// Appends events with sequential numeric ids and one-second spaced
/// timestamps, returning each new event's id for use as a parent.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuilder {
    events: Vec<ExecutionEvent>,
}

impl HistoryBuilder {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event of the given type with no details.
    pub fn event(&mut self, parent: Option<&EventId>, event_type: EventType) -> EventId {
        self.push(parent, event_type, |_| {})
    }

    /// Appends the execution start. Its back-reference is the `0` root marker.
    pub fn execution_started(&mut self) -> EventId {
        let root = EventId::from(0_u64);
        self.event(Some(&root), EventType::ExecutionStarted)
    }

    /// Appends `TaskStateEntered` for `name`.
    pub fn task_entered(&mut self, parent: Option<&EventId>, name: &str) -> EventId {
        self.push(parent, EventType::TaskStateEntered, |event| {
            event.state_entered_event_details = Some(state(name));
        })
    }

    /// Appends `TaskStateExited` for `name`.
    pub fn task_exited(&mut self, parent: Option<&EventId>, name: &str) -> EventId {
        self.push(parent, EventType::TaskStateExited, |event| {
            event.state_exited_event_details = Some(state(name));
        })
    }

    /// Appends a complete task: entered, succeeded, exited. Returns the exit.
    pub fn task(&mut self, parent: Option<&EventId>, name: &str) -> EventId {
        let entered = self.task_entered(parent, name);
        let succeeded = self.event(Some(&entered), EventType::TaskSucceeded);
        self.task_exited(Some(&succeeded), name)
    }

    /// Appends `MapStateEntered` and `MapStateStarted`. Returns the start.
    pub fn map_started(&mut self, parent: Option<&EventId>, name: &str, length: u64) -> EventId {
        let entered = self.push(parent, EventType::MapStateEntered, |event| {
            event.state_entered_event_details = Some(state(name));
        });
        self.push(Some(&entered), EventType::MapStateStarted, |event| {
            event.map_state_started_event_details = Some(MapStartedDetails { length });
        })
    }

    /// Appends `MapIterationStarted` under a map start.
    pub fn iteration_started(&mut self, map: &EventId, index: u64) -> EventId {
        let name = self.state_name_of_map(map);
        self.push(Some(map), EventType::MapIterationStarted, |event| {
            event.map_iteration_started_event_details = Some(MapIterationDetails { name, index });
        })
    }

    /// Appends `MapIterationSucceeded` after the last event of an iteration.
    pub fn iteration_succeeded(&mut self, parent: &EventId, name: &str, index: u64) -> EventId {
        let details = MapIterationDetails {
            name: name.to_string(),
            index,
        };
        self.push(Some(parent), EventType::MapIterationSucceeded, |event| {
            event.map_iteration_succeeded_event_details = Some(details);
        })
    }

    /// Appends `MapStateSucceeded` and `MapStateExited`. Returns the exit.
    pub fn map_finished(&mut self, parent: &EventId, name: &str) -> EventId {
        let succeeded = self.event(Some(parent), EventType::MapStateSucceeded);
        self.push(Some(&succeeded), EventType::MapStateExited, |event| {
            event.state_exited_event_details = Some(state(name));
        })
    }

    /// Appends `ExecutionSucceeded`.
    pub fn execution_succeeded(&mut self, parent: &EventId) -> EventId {
        self.event(Some(parent), EventType::ExecutionSucceeded)
    }

    /// Appends `ExecutionFailed` with error details.
    pub fn execution_failed(&mut self, parent: &EventId, error: &str, cause: &str) -> EventId {
        let details = ExecutionErrorDetails {
            error: Some(error.to_string()),
            cause: Some(cause.to_string()),
        };
        self.push(Some(parent), EventType::ExecutionFailed, |event| {
            event.execution_failed_event_details = Some(details);
        })
    }

    /// Returns the events appended so far.
    #[must_use]
    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    /// Consumes the builder.
    #[must_use]
    pub fn build(self) -> Vec<ExecutionEvent> {
        self.events
    }

    fn push(&mut self, parent: Option<&EventId>, event_type: EventType, detail: impl FnOnce(&mut ExecutionEvent)) -> EventId {
        let sequence = self.events.len() as u64 + 1;
        let mut event = ExecutionEvent::new(EventId::from(sequence), event_type, parent.cloned());
        event.timestamp = i64::try_from(sequence)
            .ok()
            .and_then(|offset| DateTime::from_timestamp(EPOCH_SECONDS + offset, 0));
        detail(&mut event);

        let id = event.id.clone();
        self.events.push(event);
        id
    }

    fn state_name_of_map(&self, map: &EventId) -> String {
        let entered = self
            .events
            .iter()
            .find(|event| &event.id == map)
            .and_then(|started| started.previous_event_id.as_ref());
        self.events
            .iter()
            .find(|event| Some(&event.id) == entered)
            .and_then(ExecutionEvent::state_name)
            .unwrap_or_default()
            .to_string()
    }
}

fn state(name: &str) -> StateDetails {
    StateDetails { name: name.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_and_links() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let map = history.map_started(Some(&root), "Filters", 1);
        let iteration = history.iteration_started(&map, 0);
        let events = history.build();

        assert_eq!(root, EventId::from(1_u64));
        assert_eq!(events[0].parent_id(), None);
        assert_eq!(events[1].event_type, EventType::MapStateEntered);
        assert_eq!(events[2].parent_id(), Some(&EventId::from(2_u64)));
        assert_eq!(iteration, EventId::from(4_u64));
        assert_eq!(
            events[3].map_iteration_started_event_details.as_ref().map(|d| d.name.as_str()),
            Some("Filters")
        );
        assert!(events[0].timestamp < events[3].timestamp);
    }
}
