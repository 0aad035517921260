//! Built-in skeletons for each process kind.
//!
//! State names here are the join key with execution histories, so they must
//! not change between releases for the same process kind.

use super::{IterationSource, StepArgs, StepSkeleton};
use crate::context::ProcessKind;

/// Name of the per-sample map in the quality-control pipeline.
pub const QC_FILTER_MAP: &str = "Filters";

/// Quality-control steps in execution order: (state name, task name, runs per sample).
const QC_STEPS: [(&str, &str, bool); 7] = [
    ("ClassifierFilter", "classifier", true),
    ("CellSizeDistributionFilter", "cellSizeDistribution", true),
    ("MitochondrialContentFilter", "mitochondrialContent", true),
    ("NumGenesVsNumUmisFilter", "numGenesVsNumUmis", true),
    ("DoubletScoresFilter", "doubletScores", true),
    ("DataIntegration", "dataIntegration", false),
    ("ConfigureEmbedding", "configureEmbedding", false),
];

const PRIMARY_STEPS: [(&str, &str); 7] = [
    ("DownloadGem", "downloadGem"),
    ("PreProcessing", "preproc"),
    ("EmptyDrops", "emptyDrops"),
    ("DoubletScores", "doubletScores"),
    ("CreateSeurat", "createSeurat"),
    ("PrepareExperiment", "prepareExperiment"),
    ("UploadToAWS", "uploadToAWS"),
];

const SUBSET_STEPS: [(&str, &str); 3] = [
    ("SubsetSeurat", "subsetSeurat"),
    ("PrepareExperiment", "prepareExperiment"),
    ("UploadToAWS", "uploadToAWS"),
];

/// Returns the complete skeleton for a process kind.
#[must_use]
pub fn skeleton_for(process: ProcessKind) -> StepSkeleton {
    match process {
        ProcessKind::Primary => primary_skeleton(),
        ProcessKind::QualityControl => qc_skeleton(&qc_steps_to_run(&[])),
        ProcessKind::Subset => subset_skeleton(),
    }
}

/// The primary multi-stage pipeline.
#[must_use]
pub fn primary_skeleton() -> StepSkeleton {
    linear(&PRIMARY_STEPS)
}

/// The data-subset pipeline.
#[must_use]
pub fn subset_skeleton() -> StepSkeleton {
    linear(&SUBSET_STEPS)
}

fn linear(steps: &[(&str, &str)]) -> StepSkeleton {
    steps
        .iter()
        .fold(StepSkeleton::new(), |skeleton, (name, task)| skeleton.task(*name, StepArgs::new(*task)))
        .terminal()
}

/// Returns the quality-control task names to run after `changed` steps were
/// reconfigured.
///
/// Everything from the earliest changed step onwards is re-run. Nothing
/// changed (or only unknown names) means a full run.
#[must_use]
pub fn qc_steps_to_run(changed: &[&str]) -> Vec<&'static str> {
    let first = QC_STEPS
        .iter()
        .position(|(_, task, _)| changed.contains(task))
        .unwrap_or(0);

    QC_STEPS[first..].iter().map(|(_, task, _)| *task).collect()
}

/// Builds a quality-control skeleton containing only the given tasks.
///
/// Per-sample filters are wrapped in the [`QC_FILTER_MAP`] map; the map is
/// omitted when no filter remains.
#[must_use]
pub fn qc_skeleton(tasks: &[&str]) -> StepSkeleton {
    let selected = QC_STEPS.iter().filter(|(_, task, _)| tasks.contains(task));

    let mut filters = StepSkeleton::new();
    let mut tail = Vec::new();
    for &(name, task, per_sample) in selected {
        if per_sample {
            filters = filters.task(name, StepArgs::new(task).per_sample());
        } else {
            tail.push((name, task));
        }
    }

    let mut skeleton = StepSkeleton::new();
    if !filters.is_empty() {
        skeleton = skeleton.parallel_map(QC_FILTER_MAP, IterationSource::PerSample, filters.terminal());
    }
    for (name, task) in tail {
        let args = if task == "dataIntegration" {
            StepArgs::new(task).upload_count_matrix()
        } else {
            StepArgs::new(task)
        };
        skeleton = skeleton.task(name, args);
    }
    skeleton.terminal()
}
