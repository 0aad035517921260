//! Concrete node construction.

use super::definition::{CatchClause, GraphDefinition, GraphNode, NodeType};
use crate::config::AssemblerConfig;
use crate::context::PipelineContext;
use crate::errors::AssemblyError;
use crate::skeleton::{IterationSource, StepArgs};
use serde_json::{json, Map, Value};

/// Turns abstract steps plus resolved parameters into graph nodes.
#[derive(Debug, Clone)]
pub struct StepConstructor<'a> {
    config: &'a AssemblerConfig,
}

impl<'a> StepConstructor<'a> {
    /// Creates a constructor using the given policy.
    #[must_use]
    pub fn new(config: &'a AssemblerConfig) -> Self {
        Self { config }
    }

    /// Returns the catch clause attached to every task and map node.
    #[must_use]
    pub fn catch_clause(&self) -> CatchClause {
        CatchClause::catch_all(&self.config.error_node_name)
    }

    /// Parameters every task receives; process-specific values override them.
    #[must_use]
    pub fn general_params(&self, ctx: &PipelineContext, args: &StepArgs) -> Map<String, Value> {
        let identity = ctx.identity();
        let mut params = Map::new();
        params.insert("experimentId".to_string(), json!(identity.experiment_id));
        params.insert("taskName".to_string(), json!(args.task_name));
        params.insert("processName".to_string(), json!(ctx.process().as_str()));
        params.insert(
            "server".to_string(),
            json!(self.config.worker_server(&identity.experiment_id, &identity.sandbox_id)),
        );
        params
    }

    /// Builds a task node.
    ///
    /// `next` is the successor in the same sequence, `None` for the last step.
    #[must_use]
    pub fn task(
        &self,
        ctx: &PipelineContext,
        args: &StepArgs,
        resolved: Map<String, Value>,
        next: Option<String>,
    ) -> GraphNode {
        let mut parameters = self.general_params(ctx, args);
        parameters.extend(resolved);

        let mut node = GraphNode::bare(NodeType::Task);
        node.resource = Some(ctx.identity().activity.as_str().to_string());
        node.parameters = parameters;
        node.result_path = Some(Value::Null);
        node.timeout_seconds = Some(self.config.task_timeout_seconds);
        node.heartbeat_seconds = Some(self.config.heartbeat_seconds);
        node.chain(next);
        node.catch = vec![self.catch_clause()];
        node
    }

    /// Builds a parallel-map node around an assembled branch.
    #[must_use]
    pub fn parallel_map(
        &self,
        iteration: &IterationSource,
        branch: GraphDefinition,
        next: Option<String>,
    ) -> GraphNode {
        let items_path = match iteration {
            IterationSource::PerSample => self.config.samples_items_path.clone(),
            IterationSource::InputPath(path) => path.clone(),
        };

        let mut node = GraphNode::bare(NodeType::ParallelMap);
        node.items_path = Some(items_path);
        node.result_path = Some(Value::Null);
        node.iterator = Some(Box::new(branch));
        node.chain(next);
        node.catch = vec![self.catch_clause()];
        node
    }

    /// Builds the shared error-report node.
    ///
    /// It publishes a pipeline-error message for the run to the run's
    /// notification channel and is a leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if the activity handle cannot be parsed.
    pub fn error_report(&self, ctx: &PipelineContext) -> Result<GraphNode, AssemblyError> {
        let identity = ctx.identity();
        let activity_id = identity.activity.activity_id()?;
        let credential = ctx
            .credential()
            .map_or_else(String::new, |credential| credential.expose().to_string());

        let message = json!({
            "taskName": "pipelineError",
            "experimentId": identity.experiment_id,
            "apiUrl": self.config.public_api_url,
            "input": {
                "authJWT": credential,
                "experimentId": identity.experiment_id,
                "error": "{}",
                "taskName": "pipelineError",
                "sandboxId": identity.sandbox_id,
                "activityId": activity_id,
                "processName": ctx.process().as_str(),
            },
        });

        let mut parameters = Map::new();
        parameters.insert(
            "TopicArn".to_string(),
            json!(self.config.notification_channel(
                &identity.account_id,
                &identity.environment,
                &identity.sandbox_id
            )),
        );
        parameters.insert("Message".to_string(), json!(message.to_string()));
        parameters.insert(
            "MessageAttributes".to_string(),
            json!({ "type": { "DataType": "String", "StringValue": "PipelineResponse" } }),
        );

        let mut node = GraphNode::bare(NodeType::ErrorReport);
        node.resource = Some(self.config.notification_resource.clone());
        node.parameters = parameters;
        node.end = true;
        Ok(node)
    }
}
