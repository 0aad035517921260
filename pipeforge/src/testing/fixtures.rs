//! Run contexts for each process kind.

use crate::context::{ActivityHandle, Credential, PipelineContext, ProcessKind, RunIdentity, SubsetRequest};
use serde_json::{json, Map, Value};

/// Account id used by every fixture.
pub const TEST_ACCOUNT: &str = "000000000000";

/// Activity handle used by every fixture.
pub const TEST_ACTIVITY: &str = "arn:aws:states:eu-west-1:000000000000:activity:pipeline-test-activity";

/// Credential forwarded by every fixture.
pub const TEST_CREDENTIAL: &str = "test-jwt";

/// Builds the identity of a test run in the `default` sandbox.
#[must_use]
pub fn test_identity(experiment_id: &str) -> RunIdentity {
    RunIdentity::new(
        experiment_id,
        "default",
        "test",
        TEST_ACCOUNT,
        ActivityHandle::new(TEST_ACTIVITY),
    )
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// A quality-control run over the given samples.
///
/// Only the classifier filter has stored settings.
#[must_use]
pub fn qc_context(samples: &[&str]) -> PipelineContext {
    PipelineContext::new(test_identity("qc-exp"), ProcessKind::QualityControl)
        .with_processing_config(object(json!({
            "classifier": { "enabled": true, "auto": true },
        })))
        .with_samples(samples.iter().copied())
        .with_credential(Credential::new(TEST_CREDENTIAL))
}

/// A primary-processing run with precomputed task parameters.
#[must_use]
pub fn gem2s_context() -> PipelineContext {
    PipelineContext::new(test_identity("gem2s-exp"), ProcessKind::Primary)
        .with_task_params(object(json!({
            "projectId": "project-1",
            "experimentName": "Test experiment",
            "organism": null,
            "input": { "type": "10x" },
            "sampleIds": ["s1", "s2"],
            "sampleNames": ["Sample 1", "Sample 2"],
            "authJWT": TEST_CREDENTIAL,
        })))
        .with_credential(Credential::new(TEST_CREDENTIAL))
}

/// A subset run taking two cell sets from `parent-exp`.
#[must_use]
pub fn subset_context() -> PipelineContext {
    PipelineContext::new(test_identity("subset-exp"), ProcessKind::Subset)
        .with_subset(SubsetRequest::new(
            "parent-exp",
            "subset-exp",
            "Subset of parent",
            vec!["louvain-0".to_string(), "louvain-1".to_string()],
        ))
        .with_credential(Credential::new(TEST_CREDENTIAL))
}
