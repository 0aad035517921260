//! # Pipeforge
//!
//! Orchestration plumbing for multi-step analysis pipelines run by an
//! external workflow executor.
//!
//! Pipeforge provides:
//!
//! - **Graph assembly**: Turn a declarative step skeleton and a run context
//!   into an executable workflow definition with a single error sink
//! - **Status replay**: Reconstruct which steps have completed, across every
//!   parallel branch, from the executor's parent-linked event history
//! - **Hook dispatch**: Fan inbound job notifications out to keyed and
//!   wildcard handlers with per-handler failure isolation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeforge::prelude::*;
//!
//! // Assemble the quality-control pipeline for one run
//! let ctx = PipelineContext::new(identity, ProcessKind::QualityControl)
//!     .with_samples(["sample-1", "sample-2"])
//!     .with_credential(Credential::new(token));
//! let definition = assemble(&skeleton_for(ctx.process()), &ctx)?;
//!
//! // Later: which steps are done?
//! let done = completed_steps(&history)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod assembler;
pub mod config;
pub mod context;
pub mod errors;
pub mod history;
pub mod hooks;
pub mod interfaces;
pub mod launcher;
pub mod observability;
pub mod skeleton;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assembler::{assemble, GraphAssembler, GraphDefinition, GraphNode, NodeType};
    pub use crate::config::{AssemblerConfig, HookConfig};
    pub use crate::context::{
        ActivityHandle, Credential, PipelineContext, ProcessKind, RunIdentity, SubsetRequest,
    };
    pub use crate::errors::{AssemblyError, HandlerError, HistoryCorrelationError, PipeforgeError};
    pub use crate::history::{
        completed_steps, ExecutionEvent, ExecutionHistoryEngine, ExecutionStatus, PipelineStatusReport,
        StatusReporter,
    };
    pub use crate::hooks::{FnHandler, HookHandler, HookRunReport, HookRunner, JobMessage};
    pub use crate::interfaces::{ExecutionHandle, ExecutorClient, HistoryProvider};
    pub use crate::launcher::{LaunchReceipt, PipelineLauncher};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::skeleton::{skeleton_for, IterationSource, StepArgs, StepSkeleton};
}
