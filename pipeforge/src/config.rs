//! Configuration for graph assembly and hook dispatch.

use crate::errors::PipeforgeError;
use serde::{Deserialize, Serialize};

/// Configuration for the graph assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Maximum run time of a single task, in seconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_seconds: u64,
    /// Maximum silence between worker heartbeats, in seconds.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_seconds: u64,
    /// Name of the shared error-report node.
    #[serde(default = "default_error_node_name")]
    pub error_node_name: String,
    /// Executor resource that publishes notifications.
    #[serde(default = "default_notification_resource")]
    pub notification_resource: String,
    /// Region of the notification channel.
    #[serde(default = "default_region")]
    pub region: String,
    /// Public URL of the API that receives pipeline responses.
    #[serde(default = "default_api_url")]
    pub public_api_url: String,
    /// Path in the execution input holding per-sample iteration items.
    #[serde(default = "default_samples_path")]
    pub samples_items_path: String,
    /// Cluster domain suffix of the per-run worker servers.
    #[serde(default = "default_worker_domain")]
    pub worker_domain: String,
}

fn default_task_timeout() -> u64 {
    10_800
}

fn default_heartbeat() -> u64 {
    90
}

fn default_error_node_name() -> String {
    "HandleError".to_string()
}

fn default_notification_resource() -> String {
    "arn:aws:states:::sns:publish".to_string()
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_samples_path() -> String {
    "$.samples".to_string()
}

fn default_worker_domain() -> String {
    "svc.cluster.local".to_string()
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            task_timeout_seconds: default_task_timeout(),
            heartbeat_seconds: default_heartbeat(),
            error_node_name: default_error_node_name(),
            notification_resource: default_notification_resource(),
            region: default_region(),
            public_api_url: default_api_url(),
            samples_items_path: default_samples_path(),
            worker_domain: default_worker_domain(),
        }
    }
}

impl AssemblerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is invalid.
    pub fn from_json(json: &str) -> Result<Self, PipeforgeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the region of the notification channel.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the public API URL.
    #[must_use]
    pub fn with_public_api_url(mut self, url: impl Into<String>) -> Self {
        self.public_api_url = url.into();
        self
    }

    /// Sets the error-report node name.
    #[must_use]
    pub fn with_error_node_name(mut self, name: impl Into<String>) -> Self {
        self.error_node_name = name.into();
        self
    }

    /// Checks that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout is zero or a name is blank.
    pub fn validate(&self) -> Result<(), PipeforgeError> {
        if self.task_timeout_seconds == 0 || self.heartbeat_seconds == 0 {
            return Err(PipeforgeError::Config(
                "task timeout and heartbeat must be positive".to_string(),
            ));
        }
        if self.heartbeat_seconds >= self.task_timeout_seconds {
            return Err(PipeforgeError::Config(format!(
                "heartbeat ({}s) must be shorter than the task timeout ({}s)",
                self.heartbeat_seconds, self.task_timeout_seconds
            )));
        }
        if self.error_node_name.trim().is_empty() {
            return Err(PipeforgeError::Config(
                "error node name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Formats the notification channel for a run.
    #[must_use]
    pub fn notification_channel(&self, account_id: &str, environment: &str, sandbox_id: &str) -> String {
        format!(
            "arn:aws:sns:{}:{}:work-results-{}-{}-v2",
            self.region, account_id, environment, sandbox_id
        )
    }

    /// Formats the address of the worker server that runs an experiment's tasks.
    #[must_use]
    pub fn worker_server(&self, experiment_id: &str, sandbox_id: &str) -> String {
        format!(
            "remoter-server-{}.pipeline-{}.{}",
            experiment_id, sandbox_id, self.worker_domain
        )
    }
}

/// Configuration for hook dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Message attribute used to select keyed handlers.
    #[serde(default = "default_discriminant")]
    pub discriminant_field: String,
}

fn default_discriminant() -> String {
    "taskName".to_string()
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            discriminant_field: default_discriminant(),
        }
    }
}

impl HookConfig {
    /// Creates a configuration keyed on a custom field.
    #[must_use]
    pub fn with_discriminant(field: impl Into<String>) -> Self {
        Self {
            discriminant_field: field.into(),
        }
    }
}
