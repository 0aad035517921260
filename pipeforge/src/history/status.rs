//! Execution status reporting.

use super::engine::ExecutionHistoryEngine;
use super::event::{EventType, ExecutionErrorDetails, ExecutionEvent};
use crate::context::ProcessKind;
use crate::errors::{HistoryCorrelationError, PipeforgeError};
use crate::interfaces::{ExecutionHandle, HistoryProvider};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Overall state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// No execution exists for the pipeline.
    NotCreated,
    /// Started and not yet finished.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped by the executor's timeout.
    TimedOut,
    /// Stopped on request.
    Aborted,
}

impl ExecutionStatus {
    /// Derives the status from the execution-level events of a history.
    ///
    /// A handle with no finishing event is still running.
    #[must_use]
    pub fn from_events(events: &[ExecutionEvent]) -> Self {
        events
            .iter()
            .rev()
            .find_map(|event| match event.event_type {
                EventType::ExecutionSucceeded => Some(Self::Succeeded),
                EventType::ExecutionFailed => Some(Self::Failed),
                EventType::ExecutionTimedOut => Some(Self::TimedOut),
                EventType::ExecutionAborted => Some(Self::Aborted),
                _ => None,
            })
            .unwrap_or(Self::Running)
    }

    /// Returns true once the execution can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotCreated | Self::Running)
    }

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotCreated => "NOT_CREATED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one pipeline run as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusReport {
    /// Overall state.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub start_date: Option<DateTime<Utc>>,
    /// When the execution finished.
    pub stop_date: Option<DateTime<Utc>>,
    /// Failure details of a failed, timed out or aborted execution.
    pub error: Option<ExecutionErrorDetails>,
    /// Steps complete in every branch, in completion order.
    pub completed_steps: Vec<String>,
}

impl PipelineStatusReport {
    /// The report for a pipeline that was never launched.
    #[must_use]
    pub fn not_created() -> Self {
        Self {
            status: ExecutionStatus::NotCreated,
            start_date: None,
            stop_date: None,
            error: None,
            completed_steps: Vec::new(),
        }
    }

    /// Builds a report from an execution history.
    ///
    /// # Errors
    ///
    /// Returns an error if the history's back-references are malformed.
    pub fn from_history(events: &[ExecutionEvent]) -> Result<Self, HistoryCorrelationError> {
        let completed_steps = ExecutionHistoryEngine::new().completed_steps(events)?;
        let status = ExecutionStatus::from_events(events);

        let start_date = events
            .iter()
            .find(|event| event.event_type == EventType::ExecutionStarted)
            .and_then(|event| event.timestamp);
        let finished = events.iter().rev().find(|event| event.event_type.ends_execution());

        Ok(Self {
            status,
            start_date,
            stop_date: finished.and_then(|event| event.timestamp),
            error: finished.and_then(ExecutionEvent::execution_error).cloned(),
            completed_steps,
        })
    }
}

/// Answers status queries for execution handles.
#[derive(Debug)]
pub struct StatusReporter<P: HistoryProvider> {
    provider: P,
}

impl<P: HistoryProvider> StatusReporter<P> {
    /// Creates a reporter reading histories from `provider`.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Reports the status of an execution.
    ///
    /// `None` means the pipeline was never launched; the provider is not
    /// consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or the history is malformed.
    pub async fn report(&self, handle: Option<&ExecutionHandle>) -> Result<PipelineStatusReport, PipeforgeError> {
        let Some(handle) = handle else {
            return Ok(PipelineStatusReport::not_created());
        };

        let events = self
            .provider
            .history(handle)
            .await
            .map_err(|err| PipeforgeError::collaborator("history provider", &err))?;

        let report = PipelineStatusReport::from_history(&events).map_err(|source| {
            warn!(execution = %handle, code = source.code(), "Execution history is malformed: {source}");
            PipeforgeError::ExecutionHistory {
                execution: handle.to_string(),
                source,
            }
        })?;

        info!(
            execution = %handle,
            status = %report.status,
            completed = report.completed_steps.len(),
            "Reported pipeline status"
        );
        Ok(report)
    }

    /// Reports every process of an experiment concurrently.
    ///
    /// Results keep the input order. The first failing query fails the call.
    ///
    /// # Errors
    ///
    /// See [`StatusReporter::report`].
    pub async fn report_all(
        &self,
        runs: &[(ProcessKind, Option<ExecutionHandle>)],
    ) -> Result<Vec<(ProcessKind, PipelineStatusReport)>, PipeforgeError> {
        let queries = runs.iter().map(|(process, handle)| async move {
            let report = self.report(handle.as_ref()).await?;
            Ok::<_, PipeforgeError>((*process, report))
        });
        try_join_all(queries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EventId;
    use crate::interfaces::MockHistoryProvider;
    use crate::testing::{HistoryBuilder, InMemoryHistoryProvider};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_no_handle_is_not_created_without_lookup() {
        let mut provider = MockHistoryProvider::new();
        provider.expect_history().never();

        let report = StatusReporter::new(provider).report(None).await.unwrap();
        assert_eq!(report, PipelineStatusReport::not_created());
    }

    #[tokio::test]
    async fn test_running_report() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let exit = history.task(Some(&root), "DownloadGem");
        history.task_entered(Some(&exit), "PreProcessing");
        let events = history.build();

        let mut provider = MockHistoryProvider::new();
        provider
            .expect_history()
            .times(1)
            .returning(move |_| Ok(events.clone()));

        let handle = ExecutionHandle::new("arn:execution:1");
        let report = StatusReporter::new(provider).report(Some(&handle)).await.unwrap();

        assert_eq!(report.status, ExecutionStatus::Running);
        assert!(report.start_date.is_some());
        assert!(report.stop_date.is_none());
        assert_eq!(report.completed_steps, vec!["DownloadGem"]);
    }

    #[tokio::test]
    async fn test_failed_report_carries_error() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let entered = history.task_entered(Some(&root), "DownloadGem");
        history.execution_failed(&entered, "States.TaskFailed", "worker crashed");
        let events = history.build();

        let report = PipelineStatusReport::from_history(&events).unwrap();
        assert_eq!(report.status, ExecutionStatus::Failed);
        assert!(report.status.is_terminal());
        assert!(report.stop_date.is_some());
        assert_eq!(
            report.error.and_then(|error| error.cause),
            Some("worker crashed".to_string())
        );
        assert!(report.completed_steps.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_collaborator_error() {
        let mut provider = MockHistoryProvider::new();
        provider
            .expect_history()
            .returning(|_| Err(anyhow::anyhow!("throttled")));

        let handle = ExecutionHandle::new("arn:execution:2");
        let err = StatusReporter::new(provider).report(Some(&handle)).await.unwrap_err();
        assert_eq!(err.code(), "EXTERNAL-001-COLLABORATOR");
        assert!(err.to_string().contains("throttled"));
    }

    #[tokio::test]
    async fn test_malformed_history_names_execution() {
        let mut history = HistoryBuilder::new();
        history.task_entered(Some(&EventId::new("missing")), "DownloadGem");
        let events = history.build();

        let mut provider = MockHistoryProvider::new();
        provider
            .expect_history()
            .times(1)
            .returning(move |_| Ok(events.clone()));

        let handle = ExecutionHandle::new("arn:execution:3");
        let err = StatusReporter::new(provider).report(Some(&handle)).await.unwrap_err();
        assert_eq!(err.code(), "HISTORY-002-DANGLING");
        assert!(matches!(
            &err,
            PipeforgeError::ExecutionHistory { execution, .. } if execution == "arn:execution:3"
        ));
        assert!(err.to_string().contains("arn:execution:3"));
    }

    #[tokio::test]
    async fn test_report_all_keeps_process_order() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let exit = history.task(Some(&root), "DownloadGem");
        history.execution_succeeded(&exit);

        let provider = InMemoryHistoryProvider::new();
        let handle = ExecutionHandle::new("arn:execution:gem2s");
        provider.insert(&handle, history.build());

        let reports = StatusReporter::new(provider)
            .report_all(&[(ProcessKind::Primary, Some(handle)), (ProcessKind::QualityControl, None)])
            .await
            .unwrap();

        assert_eq!(reports[0].0, ProcessKind::Primary);
        assert_eq!(reports[0].1.status, ExecutionStatus::Succeeded);
        assert_eq!(reports[0].1.completed_steps, vec!["DownloadGem"]);
        assert_eq!(reports[1], (ProcessKind::QualityControl, PipelineStatusReport::not_created()));
    }

    #[tokio::test]
    async fn test_report_all_fails_on_unknown_execution() {
        let reporter = StatusReporter::new(InMemoryHistoryProvider::new());
        let err = reporter
            .report_all(&[(ProcessKind::Subset, Some(ExecutionHandle::new("gone")))])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXTERNAL-001-COLLABORATOR");
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_value(ExecutionStatus::NotCreated).unwrap(), "NOT_CREATED");
        assert_eq!(ExecutionStatus::TimedOut.to_string(), "TIMED_OUT");
        assert_eq!(ExecutionStatus::from_events(&[]), ExecutionStatus::Running);
    }
}
