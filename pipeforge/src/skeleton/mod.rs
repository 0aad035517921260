//! Pipeline skeletons: declarative step structure, independent of any run.

mod builtin;
mod descriptor;

pub use builtin::{
    primary_skeleton, qc_skeleton, qc_steps_to_run, skeleton_for, subset_skeleton, QC_FILTER_MAP,
};
pub use descriptor::{IterationSource, StepArgs, StepDescriptor, StepSkeleton};
