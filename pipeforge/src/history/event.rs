//! Execution events as reported by the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of an execution event.
///
/// Executors report ids as numbers or strings; both normalize to their
/// decimal/string form, so `7` and `"7"` name the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates an event id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the "no previous event" marker.
    #[must_use]
    pub fn is_root_marker(&self) -> bool {
        self.0 == "0" || self.0.is_empty()
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(id) => Self::from(id),
            Raw::Text(id) => Self(id),
        })
    }
}

/// Kinds of execution events the engine distinguishes.
///
/// Variant names match the executor's event type names.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    ExecutionStarted,
    ExecutionSucceeded,
    ExecutionFailed,
    ExecutionTimedOut,
    ExecutionAborted,
    TaskStateEntered,
    TaskStateExited,
    TaskScheduled,
    TaskStarted,
    TaskSucceeded,
    TaskFailed,
    TaskTimedOut,
    MapStateEntered,
    MapStateStarted,
    MapStateSucceeded,
    MapStateFailed,
    MapStateAborted,
    MapStateExited,
    MapIterationStarted,
    MapIterationSucceeded,
    MapIterationFailed,
    MapIterationAborted,
    /// Any event type the engine does not interpret.
    #[serde(other)]
    Other,
}

impl EventType {
    /// Returns true if the event closes a map iteration.
    #[must_use]
    pub fn ends_iteration(self) -> bool {
        matches!(
            self,
            Self::MapIterationSucceeded | Self::MapIterationFailed | Self::MapIterationAborted
        )
    }

    /// Returns true if the event ends the whole execution.
    #[must_use]
    pub fn ends_execution(self) -> bool {
        matches!(
            self,
            Self::ExecutionSucceeded | Self::ExecutionFailed | Self::ExecutionTimedOut | Self::ExecutionAborted
        )
    }
}

/// Details of a state entered/exited event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDetails {
    /// The state name.
    pub name: String,
}

/// Details of a map start event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStartedDetails {
    /// Number of iterations the map runs.
    pub length: u64,
}

/// Details of a map iteration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapIterationDetails {
    /// The map state name.
    #[serde(default)]
    pub name: String,
    /// Zero-based iteration index.
    pub index: u64,
}

/// Details of a failed, timed out or aborted execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionErrorDetails {
    /// Error class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// One event of an execution history.
///
/// `previous_event_id` links each event to the event that caused it; the
/// links form a tree, not a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    /// Unique id within the history.
    pub id: EventId,
    /// The event kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The causing event; `0` or absent for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_event_id: Option<EventId>,
    /// When the event was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Set on `*StateEntered` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_entered_event_details: Option<StateDetails>,
    /// Set on `*StateExited` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_exited_event_details: Option<StateDetails>,
    /// Set on `MapStateStarted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_state_started_event_details: Option<MapStartedDetails>,
    /// Set on `MapIterationStarted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_iteration_started_event_details: Option<MapIterationDetails>,
    /// Set on `MapIterationSucceeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_iteration_succeeded_event_details: Option<MapIterationDetails>,
    /// Set on `ExecutionFailed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_failed_event_details: Option<ExecutionErrorDetails>,
    /// Set on `ExecutionTimedOut`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_timed_out_event_details: Option<ExecutionErrorDetails>,
    /// Set on `ExecutionAborted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_aborted_event_details: Option<ExecutionErrorDetails>,
}

impl ExecutionEvent {
    /// Creates an event with no details.
    #[must_use]
    pub fn new(id: impl Into<EventId>, event_type: EventType, previous: Option<EventId>) -> Self {
        Self {
            id: id.into(),
            event_type,
            previous_event_id: previous,
            timestamp: None,
            state_entered_event_details: None,
            state_exited_event_details: None,
            map_state_started_event_details: None,
            map_iteration_started_event_details: None,
            map_iteration_succeeded_event_details: None,
            execution_failed_event_details: None,
            execution_timed_out_event_details: None,
            execution_aborted_event_details: None,
        }
    }

    /// Returns the parent id, or `None` for a root event.
    #[must_use]
    pub fn parent_id(&self) -> Option<&EventId> {
        self.previous_event_id.as_ref().filter(|id| !id.is_root_marker())
    }

    /// Returns the state name of an entered or exited event.
    #[must_use]
    pub fn state_name(&self) -> Option<&str> {
        self.state_entered_event_details
            .as_ref()
            .or(self.state_exited_event_details.as_ref())
            .map(|details| details.name.as_str())
    }

    /// Returns the failure details of an execution-ending event.
    #[must_use]
    pub fn execution_error(&self) -> Option<&ExecutionErrorDetails> {
        match self.event_type {
            EventType::ExecutionFailed => self.execution_failed_event_details.as_ref(),
            EventType::ExecutionTimedOut => self.execution_timed_out_event_details.as_ref(),
            EventType::ExecutionAborted => self.execution_aborted_event_details.as_ref(),
            _ => None,
        }
    }
}
