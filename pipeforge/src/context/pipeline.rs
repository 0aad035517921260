//! The run-scoped context consumed by graph assembly.

use super::{Credential, ProcessKind, RunIdentity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inputs of a data-subset run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetRequest {
    /// The experiment cells are taken from.
    pub parent_experiment_id: String,
    /// The experiment being created.
    pub subset_experiment_id: String,
    /// Display name of the new experiment.
    pub subset_experiment_name: String,
    /// Keys of the cell sets that make up the subset.
    pub cell_set_keys: Vec<String>,
}

impl SubsetRequest {
    /// Creates a subset request.
    #[must_use]
    pub fn new(
        parent_experiment_id: impl Into<String>,
        subset_experiment_id: impl Into<String>,
        subset_experiment_name: impl Into<String>,
        cell_set_keys: Vec<String>,
    ) -> Self {
        Self {
            parent_experiment_id: parent_experiment_id.into(),
            subset_experiment_id: subset_experiment_id.into(),
            subset_experiment_name: subset_experiment_name.into(),
            cell_set_keys,
        }
    }
}

/// Immutable, run-scoped configuration for assembling one pipeline.
///
/// Built once per run. Constructors and resolvers only read from it and derive
/// fresh parameter objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    identity: RunIdentity,
    process: ProcessKind,
    #[serde(default)]
    processing_config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subset: Option<SubsetRequest>,
    #[serde(default)]
    samples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential: Option<Credential>,
}

impl PipelineContext {
    /// Creates a context for a run of the given process kind.
    #[must_use]
    pub fn new(identity: RunIdentity, process: ProcessKind) -> Self {
        Self {
            identity,
            process,
            processing_config: Map::new(),
            task_params: None,
            subset: None,
            samples: Vec::new(),
            credential: None,
        }
    }

    /// Sets the per-step processing configuration (keyed by task name).
    #[must_use]
    pub fn with_processing_config(mut self, config: Map<String, Value>) -> Self {
        self.processing_config = config;
        self
    }

    /// Sets the precomputed task parameters.
    #[must_use]
    pub fn with_task_params(mut self, params: Map<String, Value>) -> Self {
        self.task_params = Some(params);
        self
    }

    /// Sets the subset request.
    #[must_use]
    pub fn with_subset(mut self, subset: SubsetRequest) -> Self {
        self.subset = Some(subset);
        self
    }

    /// Sets the sample order used for per-sample iteration.
    #[must_use]
    pub fn with_samples(mut self, samples: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.samples = samples.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the forwarded credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the experiment id.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.identity.experiment_id
    }

    /// Returns the process kind.
    #[must_use]
    pub fn process(&self) -> ProcessKind {
        self.process
    }

    /// Returns the full processing configuration.
    #[must_use]
    pub fn processing_config(&self) -> &Map<String, Value> {
        &self.processing_config
    }

    /// Returns the configuration slice of one step, or an empty object.
    #[must_use]
    pub fn step_config(&self, task_name: &str) -> Value {
        self.processing_config
            .get(task_name)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Returns the precomputed task parameters, if any.
    #[must_use]
    pub fn task_params(&self) -> Option<&Map<String, Value>> {
        self.task_params.as_ref()
    }

    /// Returns the subset request, if any.
    #[must_use]
    pub fn subset(&self) -> Option<&SubsetRequest> {
        self.subset.as_ref()
    }

    /// Returns the sample order.
    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Returns the forwarded credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Builds the execution input handed to the executor with the definition.
    ///
    /// Quality-control runs iterate once per sample, so their input lists the
    /// samples in order; other processes start from an empty object.
    #[must_use]
    pub fn execution_input(&self) -> Value {
        match self.process {
            ProcessKind::QualityControl => {
                let samples: Vec<Value> = self
                    .samples
                    .iter()
                    .enumerate()
                    .map(|(index, sample)| serde_json::json!({ "sampleUuid": sample, "index": index }))
                    .collect();
                serde_json::json!({ "samples": samples })
            }
            ProcessKind::Primary | ProcessKind::Subset => Value::Object(Map::new()),
        }
    }
}
