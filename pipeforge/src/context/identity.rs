//! Run identity and executor resource handles.

use crate::errors::AssemblyError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

static ACTIVITY_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[a-z0-9-]+:states:[a-z0-9-]*:[0-9]*:activity:(?P<id>[A-Za-z0-9_.-]+)$")
        .unwrap_or_else(|_| unreachable!("activity pattern is a valid literal"))
});

/// Handle of the executor activity that workers poll for tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityHandle(String);

impl ActivityHandle {
    /// Wraps a raw activity handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the full handle, used as the task resource.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the activity id (the final `activity:<id>` segment).
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InvalidActivityHandle`] if the handle is not an
    /// activity ARN.
    pub fn activity_id(&self) -> Result<&str, AssemblyError> {
        ACTIVITY_ARN
            .captures(&self.0)
            .and_then(|caps| caps.name("id"))
            .map(|m| m.as_str())
            .ok_or_else(|| AssemblyError::InvalidActivityHandle {
                handle: self.0.clone(),
            })
    }
}

impl fmt::Display for ActivityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A forwarded user credential.
///
/// Passed through to workers verbatim but never printed.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw credential.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Exposes the raw credential for forwarding.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if no credential was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Identifies a pipeline run and the executor resources it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunIdentity {
    /// The experiment the run belongs to.
    pub experiment_id: String,
    /// The sandbox (deployment) the run executes in.
    pub sandbox_id: String,
    /// The deployment environment, e.g. `staging` or `production`.
    pub environment: String,
    /// The account hosting the executor resources.
    pub account_id: String,
    /// The executor activity workers poll.
    pub activity: ActivityHandle,
}

impl RunIdentity {
    /// Creates a run identity.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        sandbox_id: impl Into<String>,
        environment: impl Into<String>,
        account_id: impl Into<String>,
        activity: ActivityHandle,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            sandbox_id: sandbox_id.into(),
            environment: environment.into(),
            account_id: account_id.into(),
            activity,
        }
    }

    /// Converts to a dictionary with string values.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("experiment_id".to_string(), serde_json::json!(self.experiment_id));
        map.insert("sandbox_id".to_string(), serde_json::json!(self.sandbox_id));
        map.insert("environment".to_string(), serde_json::json!(self.environment));
        map.insert("account_id".to_string(), serde_json::json!(self.account_id));
        map.insert("activity".to_string(), serde_json::json!(self.activity.as_str()));
        map
    }
}
