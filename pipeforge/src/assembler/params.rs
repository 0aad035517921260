//! Per-process-kind parameter resolution.
//!
//! Each [`ProcessKind`] has exactly one resolver; [`resolver_for`] is the
//! dispatch table. Resolvers are pure lookups against the context.

use crate::context::{PipelineContext, ProcessKind};
use crate::errors::AssemblyError;
use crate::skeleton::StepArgs;
use serde_json::{json, Map, Value};

/// Maps a task step to its process-specific invocation parameters.
pub trait ParamResolver: Send + Sync {
    /// The process kind this resolver serves.
    fn process(&self) -> ProcessKind;

    /// Resolves the parameters of one task step.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the context lacks something the step
    /// requires.
    fn resolve(&self, ctx: &PipelineContext, args: &StepArgs) -> Result<Map<String, Value>, AssemblyError>;
}

/// Returns the resolver for a process kind.
#[must_use]
pub fn resolver_for(process: ProcessKind) -> &'static dyn ParamResolver {
    match process {
        ProcessKind::Primary => &PrimaryResolver,
        ProcessKind::QualityControl => &QualityControlResolver,
        ProcessKind::Subset => &SubsetResolver,
    }
}

fn missing(ctx: &PipelineContext, args: &StepArgs, parameter: &str) -> AssemblyError {
    AssemblyError::MissingParameter {
        experiment_id: ctx.experiment_id().to_string(),
        process: ctx.process().to_string(),
        step: args.task_name.clone(),
        parameter: parameter.to_string(),
    }
}

fn credential(ctx: &PipelineContext, args: &StepArgs) -> Result<Value, AssemblyError> {
    ctx.credential()
        .map(|credential| Value::String(credential.expose().to_string()))
        .ok_or_else(|| missing(ctx, args, "authJWT"))
}

/// Primary pipeline: the run's precomputed task parameters, passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryResolver;

impl ParamResolver for PrimaryResolver {
    fn process(&self) -> ProcessKind {
        ProcessKind::Primary
    }

    fn resolve(&self, ctx: &PipelineContext, _args: &StepArgs) -> Result<Map<String, Value>, AssemblyError> {
        ctx.task_params()
            .cloned()
            .ok_or_else(|| AssemblyError::MissingTaskParams {
                experiment_id: ctx.experiment_id().to_string(),
                process: ctx.process().to_string(),
            })
    }
}

/// Quality-control pipeline: sample reference, persistence flag, credential
/// and the step's config slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityControlResolver;

impl ParamResolver for QualityControlResolver {
    fn process(&self) -> ProcessKind {
        ProcessKind::QualityControl
    }

    fn resolve(&self, ctx: &PipelineContext, args: &StepArgs) -> Result<Map<String, Value>, AssemblyError> {
        let mut params = Map::new();
        if args.per_sample {
            // Resolved by the executor from each iteration item.
            params.insert("sampleUuid.$".to_string(), json!("$.sampleUuid"));
        } else {
            params.insert("sampleUuid".to_string(), json!(""));
        }
        params.insert("uploadCountMatrix".to_string(), json!(args.upload_count_matrix));
        params.insert("authJWT".to_string(), credential(ctx, args)?);
        params.insert("config".to_string(), ctx.step_config(&args.task_name));
        Ok(params)
    }
}

/// Subset pipeline: the subsetting step gets source/target identifiers, the
/// follow-up steps only naming and credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetResolver;

impl ParamResolver for SubsetResolver {
    fn process(&self) -> ProcessKind {
        ProcessKind::Subset
    }

    fn resolve(&self, ctx: &PipelineContext, args: &StepArgs) -> Result<Map<String, Value>, AssemblyError> {
        let subset = ctx.subset().ok_or_else(|| missing(ctx, args, "subset"))?;

        let mut params = Map::new();
        match args.task_name.as_str() {
            "subsetSeurat" => {
                params.insert("parentExperimentId".to_string(), json!(subset.parent_experiment_id));
                params.insert("subsetExperimentId".to_string(), json!(subset.subset_experiment_id));
                params.insert("cellSetKeys".to_string(), json!(subset.cell_set_keys));
            }
            "prepareExperiment" | "uploadToAWS" => {
                params.insert("experimentName".to_string(), json!(subset.subset_experiment_name));
                params.insert("authJWT".to_string(), credential(ctx, args)?);
            }
            other => {
                return Err(AssemblyError::UnsupportedStep {
                    process: ctx.process().to_string(),
                    step: other.to_string(),
                });
            }
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gem2s_context, qc_context, subset_context};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_covers_every_process_kind() {
        for kind in ProcessKind::ALL {
            assert_eq!(resolver_for(kind).process(), kind);
        }
    }

    #[test]
    fn test_primary_passes_task_params_through() {
        let ctx = gem2s_context();
        let params = resolver_for(ProcessKind::Primary)
            .resolve(&ctx, &StepArgs::new("downloadGem"))
            .unwrap();
        assert_eq!(Some(&params), ctx.task_params());
    }

    #[test]
    fn test_primary_without_task_params_fails() {
        let ctx = PipelineContext::new(gem2s_context().identity().clone(), ProcessKind::Primary);
        let err = resolver_for(ProcessKind::Primary)
            .resolve(&ctx, &StepArgs::new("downloadGem"))
            .unwrap_err();
        assert_eq!(err.code(), "ASSEMBLY-002-MISSING_TASK_PARAMS");
    }

    #[test]
    fn test_qc_per_sample_step() {
        let ctx = qc_context(&["s1", "s2"]);
        let params = resolver_for(ProcessKind::QualityControl)
            .resolve(&ctx, &StepArgs::new("classifier").per_sample())
            .unwrap();

        assert_eq!(
            Value::Object(params),
            json!({
                "sampleUuid.$": "$.sampleUuid",
                "uploadCountMatrix": false,
                "authJWT": "test-jwt",
                "config": { "enabled": true, "auto": true },
            })
        );
    }

    #[test]
    fn test_qc_global_step_defaults_config() {
        let ctx = qc_context(&["s1"]);
        let params = resolver_for(ProcessKind::QualityControl)
            .resolve(&ctx, &StepArgs::new("configureEmbedding").upload_count_matrix())
            .unwrap();

        assert_eq!(params["sampleUuid"], json!(""));
        assert_eq!(params["uploadCountMatrix"], json!(true));
        assert_eq!(params["config"], json!({}));
    }

    #[test]
    fn test_qc_requires_credential() {
        let base = qc_context(&["s1"]);
        let ctx = PipelineContext::new(base.identity().clone(), ProcessKind::QualityControl);
        let err = resolver_for(ProcessKind::QualityControl)
            .resolve(&ctx, &StepArgs::new("classifier"))
            .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::MissingParameter {
                experiment_id: ctx.experiment_id().to_string(),
                process: "qc".to_string(),
                step: "classifier".to_string(),
                parameter: "authJWT".to_string(),
            }
        );
    }

    #[test]
    fn test_subset_params_per_step() {
        let ctx = subset_context();
        let resolver = resolver_for(ProcessKind::Subset);

        let subset = resolver.resolve(&ctx, &StepArgs::new("subsetSeurat")).unwrap();
        assert_eq!(subset["parentExperimentId"], json!("parent-exp"));
        assert_eq!(subset["cellSetKeys"], json!(["louvain-0", "louvain-1"]));
        assert!(!subset.contains_key("authJWT"));

        let upload = resolver.resolve(&ctx, &StepArgs::new("uploadToAWS")).unwrap();
        assert_eq!(
            Value::Object(upload),
            json!({ "experimentName": "Subset of parent", "authJWT": "test-jwt" })
        );
    }

    #[test]
    fn test_subset_rejects_unknown_step() {
        let err = resolver_for(ProcessKind::Subset)
            .resolve(&subset_context(), &StepArgs::new("emptyDrops"))
            .unwrap_err();
        assert_eq!(err.code(), "ASSEMBLY-003-UNSUPPORTED_STEP");
    }
}
