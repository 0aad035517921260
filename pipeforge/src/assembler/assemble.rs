//! Recursive skeleton-to-definition assembly.

use super::constructor::StepConstructor;
use super::definition::GraphDefinition;
use super::params::{resolver_for, ParamResolver};
use crate::config::AssemblerConfig;
use crate::context::PipelineContext;
use crate::errors::AssemblyError;
use crate::observability::SpanTimer;
use crate::skeleton::{StepDescriptor, StepSkeleton};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Assembles workflow definitions from skeletons.
///
/// Assembly is a pure function of the skeleton, the context and the
/// configuration: the same inputs always produce an identical definition.
#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    config: AssemblerConfig,
}

impl GraphAssembler {
    /// Creates an assembler with the given policy.
    #[must_use]
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Returns the assembly policy.
    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Assembles a complete definition for one run.
    ///
    /// The result has a single error-report node that every task and map
    /// node, at every depth, routes failures to.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the skeleton is malformed or any step's
    /// parameters cannot be resolved. No partial definition is returned.
    pub fn assemble(&self, skeleton: &StepSkeleton, ctx: &PipelineContext) -> Result<GraphDefinition, AssemblyError> {
        let timer = SpanTimer::start("pipeline.assemble");
        let experiment_id = ctx.experiment_id();
        let process = ctx.process();

        skeleton.validate()?;
        if skeleton.step_names().contains(&self.config.error_node_name.as_str()) {
            return Err(AssemblyError::DuplicateStepName {
                step: self.config.error_node_name.clone(),
            });
        }
        if skeleton.is_empty() {
            return Err(AssemblyError::EmptySkeleton {
                experiment_id: experiment_id.to_string(),
                process: process.to_string(),
            });
        }

        let constructor = StepConstructor::new(&self.config);
        let resolver = resolver_for(process);

        let mut definition = self
            .assemble_sequence(skeleton, ctx, &constructor, resolver)
            .inspect_err(|err| warn!(experiment_id, %process, code = err.code(), "Pipeline assembly failed: {err}"))?;
        definition
            .states
            .insert(self.config.error_node_name.clone(), constructor.error_report(ctx)?);

        definition.validate()?;

        info!(
            experiment_id,
            %process,
            nodes = definition.node_count(),
            duration_ms = timer.elapsed_ms(),
            "Assembled pipeline definition"
        );
        Ok(definition)
    }

    fn assemble_sequence(
        &self,
        skeleton: &StepSkeleton,
        ctx: &PipelineContext,
        constructor: &StepConstructor<'_>,
        resolver: &dyn ParamResolver,
    ) -> Result<GraphDefinition, AssemblyError> {
        let named: Vec<&StepDescriptor> = skeleton
            .steps()
            .iter()
            .filter(|step| step.name().is_some())
            .collect();

        let Some(start_at) = named.first().and_then(|step| step.name()) else {
            return Err(AssemblyError::EmptySkeleton {
                experiment_id: ctx.experiment_id().to_string(),
                process: ctx.process().to_string(),
            });
        };

        let mut states = BTreeMap::new();
        for (position, step) in named.iter().enumerate() {
            let next = named
                .get(position + 1)
                .and_then(|following| following.name())
                .map(str::to_string);

            match step {
                StepDescriptor::Task { name, args } => {
                    let resolved = resolver.resolve(ctx, args)?;
                    debug!(experiment_id = ctx.experiment_id(), step = %name, "Constructed task node");
                    states.insert(name.clone(), constructor.task(ctx, args, resolved, next));
                }
                StepDescriptor::ParallelMap { name, iteration, branch } => {
                    let branch = self.assemble_sequence(branch, ctx, constructor, resolver)?;
                    debug!(
                        experiment_id = ctx.experiment_id(),
                        step = %name,
                        branch_nodes = branch.states.len(),
                        "Constructed map node"
                    );
                    states.insert(name.clone(), constructor.parallel_map(iteration, branch, next));
                }
                StepDescriptor::Terminal => {}
            }
        }

        Ok(GraphDefinition {
            start_at: start_at.to_string(),
            states,
        })
    }
}

/// Assembles a definition with the default policy.
///
/// # Errors
///
/// See [`GraphAssembler::assemble`].
pub fn assemble(skeleton: &StepSkeleton, ctx: &PipelineContext) -> Result<GraphDefinition, AssemblyError> {
    GraphAssembler::default().assemble(skeleton, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::NodeType;
    use crate::context::ProcessKind;
    use crate::skeleton::{skeleton_for, IterationSource, StepArgs};
    use crate::testing::{gem2s_context, qc_context};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_linear_chain() {
        let ctx = gem2s_context();
        let definition = assemble(&skeleton_for(ProcessKind::Primary), &ctx).unwrap();

        assert_eq!(definition.start_at, "DownloadGem");
        assert_eq!(definition.node("DownloadGem").unwrap().next.as_deref(), Some("PreProcessing"));
        let last = definition.node("UploadToAWS").unwrap();
        assert!(last.end);
        assert!(last.next.is_none());
        assert_eq!(last.catch[0].next, "HandleError");
        assert_eq!(definition.states.len(), 8);
    }

    #[test]
    fn test_nested_map_routes_to_top_level_sink() {
        let ctx = qc_context(&["s1", "s2"]);
        let definition = assemble(&skeleton_for(ProcessKind::QualityControl), &ctx).unwrap();

        let filters = definition.node("Filters").unwrap();
        assert_eq!(filters.node_type, NodeType::ParallelMap);
        assert_eq!(filters.next.as_deref(), Some("DataIntegration"));

        let branch = filters.iterator.as_ref().unwrap();
        assert_eq!(branch.start_at, "ClassifierFilter");
        assert!(branch.node("HandleError").is_none());
        assert!(branch.node("DoubletScoresFilter").unwrap().end);
        assert_eq!(definition.catch_targets().into_iter().collect::<Vec<_>>(), vec!["HandleError"]);
        assert_eq!(definition.error_nodes(), vec!["HandleError"]);
    }

    #[test]
    fn test_empty_skeleton_rejected() {
        let ctx = gem2s_context();
        let err = assemble(&StepSkeleton::new().terminal(), &ctx).unwrap_err();
        assert_eq!(err.code(), "ASSEMBLY-007-EMPTY");
    }

    #[test]
    fn test_empty_branch_rejected() {
        let ctx = qc_context(&["s1"]);
        let skeleton = StepSkeleton::new().parallel_map("Filters", IterationSource::PerSample, StepSkeleton::new());
        assert_eq!(assemble(&skeleton, &ctx).unwrap_err().code(), "ASSEMBLY-007-EMPTY");
    }

    #[test]
    fn test_step_named_like_error_node_rejected() {
        let ctx = gem2s_context();
        let skeleton = StepSkeleton::new()
            .task("DownloadGem", StepArgs::new("downloadGem"))
            .task("HandleError", StepArgs::new("downloadGem"));

        let err = assemble(&skeleton, &ctx).unwrap_err();
        assert_eq!(err.code(), "ASSEMBLY-005-DUPLICATE_STEP");
        assert!(err.to_string().contains("HandleError"));
    }

    #[test]
    fn test_resolution_failure_returns_no_graph() {
        let base = qc_context(&["s1"]);
        let ctx = PipelineContext::new(base.identity().clone(), ProcessKind::QualityControl);
        let skeleton = StepSkeleton::new().task("ClassifierFilter", StepArgs::new("classifier"));
        assert_eq!(assemble(&skeleton, &ctx).unwrap_err().code(), "ASSEMBLY-001-MISSING_PARAM");
    }

    #[test]
    fn test_custom_error_node_name() {
        let ctx = gem2s_context();
        let assembler = GraphAssembler::new(AssemblerConfig::default().with_error_node_name("ReportFailure"));
        let definition = assembler.assemble(&skeleton_for(ProcessKind::Primary), &ctx).unwrap();
        assert!(definition.node("ReportFailure").is_some());
        assert_eq!(definition.node("EmptyDrops").unwrap().catch[0].next, "ReportFailure");
    }
}
