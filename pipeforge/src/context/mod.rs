//! Run context for graph assembly.
//!
//! This module provides:
//! - Run identity and executor resource handles
//! - The closed set of process kinds
//! - The immutable per-run pipeline context

mod identity;
mod pipeline;
mod process;

pub use identity::{ActivityHandle, Credential, RunIdentity};
pub use pipeline::{PipelineContext, SubsetRequest};
pub use process::ProcessKind;
