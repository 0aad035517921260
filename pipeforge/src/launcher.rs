//! Skeleton to submitted execution, in one call.

use crate::assembler::GraphAssembler;
use crate::context::PipelineContext;
use crate::errors::PipeforgeError;
use crate::interfaces::{ExecutionHandle, ExecutorClient};
use crate::observability::RunSpanAttributes;
use crate::skeleton::{skeleton_for, StepSkeleton};
use serde::{Deserialize, Serialize};
use tracing::{error, field, info, info_span, Instrument, Span};

/// What a successful launch produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReceipt {
    /// The execution handle returned by the executor.
    pub handle: ExecutionHandle,
    /// Fingerprint of the submitted definition.
    pub fingerprint: String,
    /// Attributes recorded on the launch span.
    pub attributes: RunSpanAttributes,
}

/// Assembles pipelines and submits them to an executor.
#[derive(Debug)]
pub struct PipelineLauncher<E: ExecutorClient> {
    assembler: GraphAssembler,
    executor: E,
}

impl<E: ExecutorClient> PipelineLauncher<E> {
    /// Creates a launcher.
    #[must_use]
    pub fn new(assembler: GraphAssembler, executor: E) -> Self {
        Self { assembler, executor }
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Launches the built-in pipeline for the context's process kind.
    ///
    /// # Errors
    ///
    /// Returns an error if assembly or submission fails.
    pub async fn launch(&self, ctx: &PipelineContext) -> Result<LaunchReceipt, PipeforgeError> {
        self.launch_skeleton(&skeleton_for(ctx.process()), ctx).await
    }

    /// Launches a custom skeleton.
    ///
    /// # Errors
    ///
    /// Returns an error if assembly or submission fails. Nothing is submitted
    /// when assembly fails.
    pub async fn launch_skeleton(
        &self,
        skeleton: &StepSkeleton,
        ctx: &PipelineContext,
    ) -> Result<LaunchReceipt, PipeforgeError> {
        let attributes = RunSpanAttributes::from_context(ctx);
        let span = info_span!(
            "pipeline.launch",
            experiment_id = %attributes.experiment_id,
            process = %attributes.process,
            sandbox_id = %attributes.sandbox_id,
            fingerprint = field::Empty,
            execution = field::Empty,
        );

        async {
            let definition = self.assembler.assemble(skeleton, ctx)?;
            let fingerprint = definition.fingerprint()?;
            Span::current().record("fingerprint", fingerprint.as_str());
            let name = format!("{}-{}", ctx.process(), &fingerprint[..16]);

            let handle = self
                .executor
                .submit(&name, &definition, &ctx.execution_input())
                .await
                .map_err(|err| {
                    error!(error = %format!("{err:#}"), "Executor rejected pipeline");
                    PipeforgeError::collaborator("executor", &err)
                })?;

            Span::current().record("execution", handle.as_str());
            info!("Pipeline launched");
            let attributes = attributes.with_fingerprint(fingerprint.as_str()).with_execution(&handle);
            Ok::<_, PipeforgeError>(LaunchReceipt {
                handle,
                fingerprint,
                attributes,
            })
        }
        .instrument(span)
        .await
    }
}
