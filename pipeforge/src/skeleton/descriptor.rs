//! Abstract step descriptors and skeletons.

use crate::errors::AssemblyError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Structural arguments of a task step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepArgs {
    /// The task name workers dispatch on.
    pub task_name: String,
    /// Whether the step runs once per sample inside a map.
    #[serde(default)]
    pub per_sample: bool,
    /// Whether the step persists its count matrix.
    #[serde(default)]
    pub upload_count_matrix: bool,
}

impl StepArgs {
    /// Creates arguments for a task.
    #[must_use]
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            per_sample: false,
            upload_count_matrix: false,
        }
    }

    /// Marks the step as running once per sample.
    #[must_use]
    pub fn per_sample(mut self) -> Self {
        self.per_sample = true;
        self
    }

    /// Marks the step as persisting its count matrix.
    #[must_use]
    pub fn upload_count_matrix(mut self) -> Self {
        self.upload_count_matrix = true;
        self
    }
}

/// Where a parallel map takes its iteration items from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IterationSource {
    /// One iteration per sample of the run (derived from the context).
    PerSample,
    /// An externally supplied list at this path of the execution input.
    InputPath(String),
}

/// One node of a skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepDescriptor {
    /// A task executed by a worker.
    Task {
        /// The state name; stable join key with the execution history.
        name: String,
        /// The task's arguments.
        args: StepArgs,
    },
    /// A branch skeleton executed concurrently once per iteration item.
    ParallelMap {
        /// The state name.
        name: String,
        /// Where iteration items come from.
        iteration: IterationSource,
        /// The steps run in each iteration.
        branch: StepSkeleton,
    },
    /// Explicit end of a sequence.
    Terminal,
}

impl StepDescriptor {
    /// Returns the state name, or `None` for a terminal marker.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Task { name, .. } | Self::ParallelMap { name, .. } => Some(name),
            Self::Terminal => None,
        }
    }
}

/// A declarative, reusable sequence of step descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepSkeleton {
    steps: Vec<StepDescriptor>,
}

impl StepSkeleton {
    /// Creates an empty skeleton.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task step.
    #[must_use]
    pub fn task(mut self, name: impl Into<String>, args: StepArgs) -> Self {
        self.steps.push(StepDescriptor::Task {
            name: name.into(),
            args,
        });
        self
    }

    /// Appends a parallel map over a branch skeleton.
    #[must_use]
    pub fn parallel_map(mut self, name: impl Into<String>, iteration: IterationSource, branch: Self) -> Self {
        self.steps.push(StepDescriptor::ParallelMap {
            name: name.into(),
            iteration,
            branch,
        });
        self
    }

    /// Appends a terminal marker.
    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.steps.push(StepDescriptor::Terminal);
        self
    }

    /// Returns the top-level descriptors.
    #[must_use]
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    /// Returns true if the skeleton holds no task or map steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|step| matches!(step, StepDescriptor::Terminal))
    }

    /// Returns every state name, depth-first in declaration order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(self, &mut names, true);
        names
    }

    /// Returns the task state names only, depth-first in declaration order.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(self, &mut names, false);
        names
    }

    /// Checks name uniqueness and terminal placement across all nesting levels.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), AssemblyError> {
        let mut seen = HashSet::new();
        validate_sequence(self, &mut seen)
    }
}

fn collect_names<'a>(skeleton: &'a StepSkeleton, names: &mut Vec<&'a str>, include_maps: bool) {
    for step in &skeleton.steps {
        match step {
            StepDescriptor::Task { name, .. } => names.push(name),
            StepDescriptor::ParallelMap { name, branch, .. } => {
                if include_maps {
                    names.push(name);
                }
                collect_names(branch, names, include_maps);
            }
            StepDescriptor::Terminal => {}
        }
    }
}

fn validate_sequence<'a>(skeleton: &'a StepSkeleton, seen: &mut HashSet<&'a str>) -> Result<(), AssemblyError> {
    let last = skeleton.steps.len().saturating_sub(1);
    for (position, step) in skeleton.steps.iter().enumerate() {
        match step {
            StepDescriptor::Terminal if position != last => {
                return Err(AssemblyError::StepsAfterTerminal { position });
            }
            StepDescriptor::Terminal => {}
            StepDescriptor::Task { name, .. } => {
                if !seen.insert(name) {
                    return Err(AssemblyError::DuplicateStepName { step: name.clone() });
                }
            }
            StepDescriptor::ParallelMap { name, branch, .. } => {
                if !seen.insert(name) {
                    return Err(AssemblyError::DuplicateStepName { step: name.clone() });
                }
                validate_sequence(branch, seen)?;
            }
        }
    }
    Ok(())
}
