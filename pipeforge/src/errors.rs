//! Error types for pipeforge.
//!
//! The taxonomy follows the three engines: graph assembly, execution-history
//! correlation and hook dispatch. Each error carries a stable code and enough
//! identifiers (run, step, event) to diagnose it without re-running.

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipeforge operations.
#[derive(Debug, Error)]
pub enum PipeforgeError {
    /// Graph assembly failed.
    #[error("{0}")]
    Assembly(#[from] AssemblyError),

    /// The execution history could not be correlated.
    #[error("{0}")]
    History(#[from] HistoryCorrelationError),

    /// A fetched execution history could not be correlated.
    #[error("Execution '{execution}': {source}")]
    ExecutionHistory {
        /// The execution handle the history belongs to.
        execution: String,
        /// The correlation failure.
        #[source]
        source: HistoryCorrelationError,
    },

    /// One or more hook handlers failed during a dispatch.
    #[error("{} hook handler(s) failed: {}", .0.len(), summarize_handler_errors(.0))]
    Handlers(Vec<HandlerError>),

    /// An external collaborator (executor, history provider) failed.
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        /// Which collaborator failed.
        collaborator: &'static str,
        /// The rendered error chain.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipeforgeError {
    /// Wraps a collaborator failure, keeping the full error chain in the message.
    #[must_use]
    pub fn collaborator(collaborator: &'static str, error: &anyhow::Error) -> Self {
        Self::Collaborator {
            collaborator,
            message: format!("{error:#}"),
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Assembly(err) => err.code(),
            Self::History(err) | Self::ExecutionHistory { source: err, .. } => err.code(),
            Self::Handlers(_) => "HOOK-001-HANDLER",
            Self::Collaborator { .. } => "EXTERNAL-001-COLLABORATOR",
            Self::Config(_) => "CONFIG-001-INVALID",
            Self::Serialization(_) => "CONFIG-002-SERDE",
        }
    }
}

fn summarize_handler_errors(errors: &[HandlerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while turning a skeleton and context into a graph definition.
///
/// Assembly never returns a partial graph: any of these aborts the whole call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// A step needs a parameter the context does not provide.
    #[error("Step '{step}' of {process} run '{experiment_id}' is missing required parameter '{parameter}'")]
    MissingParameter {
        /// The run's experiment id.
        experiment_id: String,
        /// The process kind name.
        process: String,
        /// The step (task) name.
        step: String,
        /// The missing parameter.
        parameter: String,
    },

    /// The run carries no precomputed task parameters.
    #[error("{process} run '{experiment_id}' has no task parameters")]
    MissingTaskParams {
        /// The run's experiment id.
        experiment_id: String,
        /// The process kind name.
        process: String,
    },

    /// The step is not known to the resolver for this process kind.
    #[error("Step '{step}' is not supported by the {process} pipeline")]
    UnsupportedStep {
        /// The process kind name.
        process: String,
        /// The step (task) name.
        step: String,
    },

    /// The executor activity handle could not be parsed.
    #[error("Invalid executor activity handle: '{handle}'")]
    InvalidActivityHandle {
        /// The offending handle.
        handle: String,
    },

    /// Two steps in the same skeleton share a name.
    #[error("Duplicate step name '{step}' in skeleton")]
    DuplicateStepName {
        /// The duplicated name.
        step: String,
    },

    /// A sequence continues after its terminal marker.
    #[error("Skeleton has steps after the terminal marker at position {position}")]
    StepsAfterTerminal {
        /// Index of the terminal marker in its sequence.
        position: usize,
    },

    /// A skeleton (or a nested branch) contains no steps.
    #[error("Skeleton for {process} run '{experiment_id}' contains no steps")]
    EmptySkeleton {
        /// The run's experiment id.
        experiment_id: String,
        /// The process kind name.
        process: String,
    },

    /// The assembled graph violates a structural invariant.
    #[error("Assembled graph is invalid: {reason}")]
    InvalidGraph {
        /// What was violated.
        reason: String,
    },
}

impl AssemblyError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter { .. } => "ASSEMBLY-001-MISSING_PARAM",
            Self::MissingTaskParams { .. } => "ASSEMBLY-002-MISSING_TASK_PARAMS",
            Self::UnsupportedStep { .. } => "ASSEMBLY-003-UNSUPPORTED_STEP",
            Self::InvalidActivityHandle { .. } => "ASSEMBLY-004-ACTIVITY_HANDLE",
            Self::DuplicateStepName { .. } => "ASSEMBLY-005-DUPLICATE_STEP",
            Self::StepsAfterTerminal { .. } => "ASSEMBLY-006-AFTER_TERMINAL",
            Self::EmptySkeleton { .. } => "ASSEMBLY-007-EMPTY",
            Self::InvalidGraph { .. } => "ASSEMBLY-008-INVALID_GRAPH",
        }
    }

    /// Creates an invalid graph error.
    #[must_use]
    pub fn invalid_graph(reason: impl Into<String>) -> Self {
        Self::InvalidGraph {
            reason: reason.into(),
        }
    }
}

/// Errors raised when the executor's event log cannot be correlated.
///
/// These indicate an upstream defect; they are never papered over by
/// guessing which branch an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryCorrelationError {
    /// Two events share an id.
    #[error("Duplicate event id '{event_id}' in execution history")]
    DuplicateEventId {
        /// The duplicated id.
        event_id: String,
    },

    /// An event points at a previous event that is not in the log.
    #[error("Event '{event_id}' references unknown previous event '{previous_event_id}'")]
    DanglingReference {
        /// The referencing event.
        event_id: String,
        /// The missing target.
        previous_event_id: String,
    },

    /// Following previous-event pointers loops back on itself.
    #[error("Cyclic back-reference detected at event '{event_id}'")]
    Cycle {
        /// An event on the cycle.
        event_id: String,
    },

    /// A map start event has no iteration count.
    #[error("Map start event '{event_id}' has no iteration length")]
    MissingMapDetails {
        /// The map start event.
        event_id: String,
    },

    /// A map iteration event has no iteration index.
    #[error("Map iteration event '{event_id}' has no iteration index")]
    MissingIterationDetails {
        /// The iteration event.
        event_id: String,
    },

    /// An iteration index is outside `0..length`.
    #[error("Map iteration event '{event_id}' has index {index} outside 0..{length}")]
    IterationOutOfRange {
        /// The iteration event.
        event_id: String,
        /// The reported index.
        index: u64,
        /// The map's declared length.
        length: u64,
    },

    /// The same iteration index was started twice in one map.
    #[error("Map iteration event '{event_id}' restarts iteration {index}")]
    DuplicateIteration {
        /// The second start event.
        event_id: String,
        /// The repeated index.
        index: u64,
    },

    /// An iteration start event does not hang off a map start event.
    #[error("Map iteration event '{event_id}' is not preceded by a map start")]
    OrphanIteration {
        /// The iteration event.
        event_id: String,
    },

    /// A task exit whose chain never reaches a matching entry.
    #[error("Task exit event '{event_id}' for step '{step}' has no matching entry")]
    UnpairedExit {
        /// The exit event.
        event_id: String,
        /// The step name.
        step: String,
    },

    /// A state event carries no step name.
    #[error("State event '{event_id}' has no step name")]
    MissingStepName {
        /// The offending event.
        event_id: String,
    },

    /// A map end event has no open map start above it.
    #[error("Map end event '{event_id}' closes no started map")]
    UnmatchedMapClose {
        /// The map end event.
        event_id: String,
    },
}

impl HistoryCorrelationError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateEventId { .. } => "HISTORY-001-DUPLICATE_ID",
            Self::DanglingReference { .. } => "HISTORY-002-DANGLING",
            Self::Cycle { .. } => "HISTORY-003-CYCLE",
            Self::MissingMapDetails { .. } => "HISTORY-004-MAP_DETAILS",
            Self::MissingIterationDetails { .. } => "HISTORY-005-ITERATION_DETAILS",
            Self::IterationOutOfRange { .. } => "HISTORY-006-ITERATION_RANGE",
            Self::DuplicateIteration { .. } => "HISTORY-007-ITERATION_RETRY",
            Self::OrphanIteration { .. } => "HISTORY-008-ORPHAN_ITERATION",
            Self::UnpairedExit { .. } => "HISTORY-009-UNPAIRED_EXIT",
            Self::MissingStepName { .. } => "HISTORY-010-STEP_NAME",
            Self::UnmatchedMapClose { .. } => "HISTORY-011-MAP_CLOSE",
        }
    }
}

/// A failure returned by a single hook handler.
///
/// Collected by the hook runner instead of aborting the fan-out.
#[derive(Debug, Error)]
#[error("Hook handler '{handler}' ({}) failed: {error:#}", phase_label(.key.as_deref()))]
pub struct HandlerError {
    /// The discriminant key the handler was registered under; `None` for wildcard handlers.
    pub key: Option<String>,
    /// The handler's name.
    pub handler: String,
    /// What the handler returned.
    pub error: anyhow::Error,
}

fn phase_label(key: Option<&str>) -> String {
    key.map_or_else(|| "wildcard".to_string(), |k| format!("key '{k}'"))
}

impl HandlerError {
    /// Creates a new handler error.
    #[must_use]
    pub fn new(key: Option<String>, handler: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            key,
            handler: handler.into(),
            error,
        }
    }

    /// Returns true if the failing handler was a wildcard handler.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.key.is_none()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "key".to_string(),
            self.key
                .as_ref()
                .map_or(serde_json::Value::Null, |k| serde_json::json!(k)),
        );
        map.insert("handler".to_string(), serde_json::json!(self.handler));
        map.insert("error".to_string(), serde_json::json!(format!("{:#}", self.error)));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_error_codes() {
        let err = AssemblyError::UnsupportedStep {
            process: "subset".to_string(),
            step: "downloadGem".to_string(),
        };
        assert_eq!(err.code(), "ASSEMBLY-003-UNSUPPORTED_STEP");
        assert!(err.to_string().contains("downloadGem"));
    }

    #[test]
    fn test_missing_parameter_mentions_run() {
        let err = AssemblyError::MissingParameter {
            experiment_id: "exp-1".to_string(),
            process: "qc".to_string(),
            step: "classifier".to_string(),
            parameter: "authJWT".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("exp-1"));
        assert!(message.contains("authJWT"));
    }

    #[test]
    fn test_history_error_wraps_into_pipeforge_error() {
        let err: PipeforgeError = HistoryCorrelationError::DanglingReference {
            event_id: "7".to_string(),
            previous_event_id: "99".to_string(),
        }
        .into();

        assert_eq!(err.code(), "HISTORY-002-DANGLING");
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_execution_history_error_names_execution() {
        let err = PipeforgeError::ExecutionHistory {
            execution: "arn:aws:states:eu-west-1:000000000000:execution:qc".to_string(),
            source: HistoryCorrelationError::Cycle {
                event_id: "4".to_string(),
            },
        };

        assert_eq!(err.code(), "HISTORY-003-CYCLE");
        assert!(err.to_string().starts_with("Execution 'arn:aws:states"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_handler_error_display_and_dict() {
        let keyed = HandlerError::new(
            Some("uploadToAWS".to_string()),
            "continue_to_qc",
            anyhow::anyhow!("database unavailable"),
        );
        let wildcard = HandlerError::new(None, "notify", anyhow::anyhow!("socket closed"));

        assert!(keyed.to_string().contains("key 'uploadToAWS'"));
        assert!(wildcard.to_string().contains("wildcard"));
        assert!(wildcard.is_wildcard());

        let dict = keyed.to_dict();
        assert_eq!(dict["key"], serde_json::json!("uploadToAWS"));
        assert_eq!(dict["error"], serde_json::json!("database unavailable"));
    }

    #[test]
    fn test_handlers_variant_summarizes() {
        let err = PipeforgeError::Handlers(vec![
            HandlerError::new(Some("a".to_string()), "first", anyhow::anyhow!("boom")),
            HandlerError::new(None, "second", anyhow::anyhow!("bang")),
        ]);
        let message = err.to_string();
        assert!(message.starts_with("2 hook handler(s) failed"));
        assert!(message.contains("boom"));
        assert!(message.contains("bang"));
    }

    #[test]
    fn test_collaborator_keeps_chain() {
        let source = anyhow::anyhow!("connection reset").context("describe execution");
        let err = PipeforgeError::collaborator("history provider", &source);
        assert!(err.to_string().contains("describe execution: connection reset"));
    }
}
