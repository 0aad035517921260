//! Pipeline graph assembly.
//!
//! This module provides:
//! - Per-process-kind parameter resolution
//! - Construction of task, map and error-report nodes
//! - Recursive assembly of a skeleton into a validated definition

mod assemble;
mod constructor;
mod definition;
mod params;


pub use assemble::{assemble, GraphAssembler};
pub use constructor::StepConstructor;
pub use definition::{CatchClause, GraphDefinition, GraphNode, NodeType, CATCH_ALL, ERROR_RESULT_PATH};
pub use params::{
    resolver_for, ParamResolver, PrimaryResolver, QualityControlResolver, SubsetResolver,
};
