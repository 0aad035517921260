//! Execution-history replay.
//!
//! This module provides:
//! - Executor event types with tolerant id parsing
//! - An arena index over parent-linked events
//! - Completion replay that respects parallel map iterations
//! - Status reports built from histories

mod engine;
mod event;
mod index;
mod status;


pub use engine::{completed_steps, ExecutionHistoryEngine};
pub use event::{
    EventId, EventType, ExecutionErrorDetails, ExecutionEvent, MapIterationDetails, MapStartedDetails,
    StateDetails,
};
pub use index::EventIndex;
pub use status::{ExecutionStatus, PipelineStatusReport, StatusReporter};
