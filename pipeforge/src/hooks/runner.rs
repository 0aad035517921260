//! Keyed and wildcard fan-out of job messages.

use super::handler::HookHandler;
use super::message::JobMessage;
use crate::config::HookConfig;
use crate::errors::{HandlerError, PipeforgeError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of dispatching one message.
#[derive(Debug)]
pub struct HookRunReport {
    /// Id correlating the log lines of this dispatch.
    pub dispatch_id: Uuid,
    /// The discriminant value the message carried.
    pub key: Option<String>,
    /// Handlers invoked, in invocation order.
    pub invoked: Vec<String>,
    /// Handlers that failed.
    pub failures: Vec<HandlerError>,
}

impl HookRunReport {
    /// Returns true if every invoked handler succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Treats any handler failure as fatal.
    ///
    /// # Errors
    ///
    /// Returns [`PipeforgeError::Handlers`] with every failure if any handler failed.
    pub fn into_result(self) -> Result<(), PipeforgeError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(PipeforgeError::Handlers(self.failures))
        }
    }
}

/// Registry of hook handlers, keyed by the message discriminant.
///
/// Built once at startup and shared (for example behind an `Arc`) with
/// whatever receives job messages. Dispatch only reads the registry.
#[derive(Default)]
pub struct HookRunner {
    config: HookConfig,
    keyed: HashMap<String, Vec<Arc<dyn HookHandler>>>,
    wildcard: Vec<Arc<dyn HookHandler>>,
}

impl fmt::Debug for HookRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.keyed.keys().collect();
        keys.sort();
        f.debug_struct("HookRunner")
            .field("discriminant_field", &self.config.discriminant_field)
            .field("keys", &keys)
            .field("wildcard", &self.wildcard.len())
            .finish()
    }
}

impl HookRunner {
    /// Creates an empty runner.
    #[must_use]
    pub fn new(config: HookConfig) -> Self {
        Self {
            config,
            keyed: HashMap::new(),
            wildcard: Vec::new(),
        }
    }

    /// Returns the runner configuration.
    #[must_use]
    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Appends handlers for messages whose discriminant equals `key`.
    pub fn register<I>(&mut self, key: impl Into<String>, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn HookHandler>>,
    {
        self.keyed.entry(key.into()).or_default().extend(handlers);
        self
    }

    /// Appends handlers that see every message.
    pub fn register_all<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn HookHandler>>,
    {
        self.wildcard.extend(handlers);
        self
    }

    /// Returns the number of handlers registered under `key`.
    #[must_use]
    pub fn handler_count(&self, key: &str) -> usize {
        self.keyed.get(key).map_or(0, Vec::len)
    }

    /// Returns the number of wildcard handlers.
    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.wildcard.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wildcard.is_empty() && self.keyed.values().all(Vec::is_empty)
    }

    /// Dispatches a message.
    ///
    /// Handlers registered under the message's discriminant run first, one
    /// at a time in registration order, followed by the wildcard handlers.
    /// A failing handler is recorded and the fan-out continues.
    pub async fn run(&self, message: &JobMessage) -> HookRunReport {
        let dispatch_id = Uuid::new_v4();
        let key = message.discriminant(&self.config.discriminant_field);
        let experiment_id = message.experiment_id().unwrap_or_default();

        let mut report = HookRunReport {
            dispatch_id,
            key: key.map(str::to_string),
            invoked: Vec::new(),
            failures: Vec::new(),
        };

        let keyed = key.and_then(|k| self.keyed.get(k)).map(Vec::as_slice).unwrap_or_default();
        if keyed.is_empty() {
            debug!(%dispatch_id, hook_key = key, experiment_id, "No keyed hook handlers");
        }
        for handler in keyed {
            self.invoke(handler.as_ref(), key, message, &mut report).await;
        }
        for handler in &self.wildcard {
            self.invoke(handler.as_ref(), None, message, &mut report).await;
        }

        debug!(
            %dispatch_id,
            hook_key = key,
            experiment_id,
            invoked = report.invoked.len(),
            failed = report.failures.len(),
            "Dispatched job message"
        );
        report
    }

    async fn invoke(&self, handler: &dyn HookHandler, key: Option<&str>, message: &JobMessage, report: &mut HookRunReport) {
        let name = handler.name();
        report.invoked.push(name.to_string());

        if let Err(error) = handler.handle(message).await {
            warn!(
                dispatch_id = %report.dispatch_id,
                hook_key = key,
                handler = name,
                field = %self.config.discriminant_field,
                "Hook handler failed: {error:#}"
            );
            report
                .failures
                .push(HandlerError::new(key.map(str::to_string), name, error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingHandler, HandlerLog, RecordingHandler};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn message(task: &str) -> JobMessage {
        JobMessage::from_value(json!({"taskName": task, "experimentId": "exp-1"})).unwrap()
    }

    #[tokio::test]
    async fn test_keyed_then_wildcard_in_registration_order() {
        let log = HandlerLog::default();
        let mut runner = HookRunner::default();
        runner
            .register_all([RecordingHandler::shared("all-1", &log)])
            .register(
                "assignPodToPipeline",
                [RecordingHandler::shared("first", &log), RecordingHandler::shared("second", &log)],
            )
            .register("other", [RecordingHandler::shared("unrelated", &log)])
            .register_all([RecordingHandler::shared("all-2", &log)]);

        let report = runner.run(&message("assignPodToPipeline")).await;

        assert!(report.is_success());
        assert_eq!(report.key.as_deref(), Some("assignPodToPipeline"));
        assert_eq!(log.names(), vec!["first", "second", "all-1", "all-2"]);
        assert_eq!(report.invoked, log.names());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let log = HandlerLog::default();
        let mut runner = HookRunner::default();
        runner
            .register(
                "classifier",
                [FailingHandler::shared("broken", "pod patch rejected", &log), RecordingHandler::shared("after", &log)],
            )
            .register_all([RecordingHandler::shared("wildcard", &log)]);

        let report = runner.run(&message("classifier")).await;

        assert_eq!(log.names(), vec!["broken", "after", "wildcard"]);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.handler, "broken");
        assert_eq!(failure.key.as_deref(), Some("classifier"));
        assert!(failure.to_string().contains("pod patch rejected"));

        let err = report.into_result().unwrap_err();
        assert_eq!(err.code(), "HOOK-001-HANDLER");
    }

    #[tokio::test]
    async fn test_unknown_key_runs_only_wildcards() {
        let log = HandlerLog::default();
        let mut runner = HookRunner::default();
        runner
            .register("known", [RecordingHandler::shared("keyed", &log)])
            .register_all([RecordingHandler::shared("wildcard", &log)]);

        let report = runner.run(&message("unknown")).await;
        assert_eq!(report.invoked, vec!["wildcard"]);

        let report = runner.run(&JobMessage::default()).await;
        assert!(report.key.is_none());
        assert_eq!(report.invoked, vec!["wildcard"]);
    }

    #[tokio::test]
    async fn test_wildcard_failure_has_no_key() {
        let mut runner = HookRunner::default();
        runner.register_all([FailingHandler::shared("notify", "socket closed", &HandlerLog::default())]);

        let report = runner.run(&message("anything")).await;
        assert!(report.failures[0].is_wildcard());
    }

    #[tokio::test]
    async fn test_custom_discriminant_field() {
        let handler = Arc::new(RecordingHandler::new("typed"));
        let mut runner = HookRunner::new(HookConfig::with_discriminant("type"));
        runner.register("response", [handler.clone() as Arc<dyn HookHandler>]);

        let msg = JobMessage::from_value(json!({"type": "response", "taskName": "ignored"})).unwrap();
        runner.run(&msg).await;
        assert_eq!(handler.call_count(), 1);
        assert_eq!(handler.messages()[0], msg);
    }

    #[test]
    fn test_counts() {
        let mut runner = HookRunner::default();
        assert!(runner.is_empty());
        runner.register("a", [RecordingHandler::shared("x", &HandlerLog::default())]);
        runner.register("a", [RecordingHandler::shared("y", &HandlerLog::default())]);
        assert_eq!(runner.handler_count("a"), 2);
        assert_eq!(runner.handler_count("b"), 0);
        assert_eq!(runner.wildcard_count(), 0);
        assert!(!runner.is_empty());
    }
}
