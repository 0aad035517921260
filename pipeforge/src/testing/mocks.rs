//! In-memory collaborators and hook handlers for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::assembler::GraphDefinition;
use crate::history::ExecutionEvent;
use crate::hooks::{HookHandler, JobMessage};
use crate::interfaces::{ExecutionHandle, ExecutorClient, HistoryProvider};

/// Invocation order shared across several handlers.
#[derive(Debug, Clone, Default)]
pub struct HandlerLog(Arc<Mutex<Vec<String>>>);

impl HandlerLog {
    /// Records that a handler ran.
    pub fn push(&self, name: &str) {
        self.0.lock().push(name.to_string());
    }

    /// Returns the handler names in invocation order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// A handler that records every message it receives.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    name: String,
    messages: Mutex<Vec<JobMessage>>,
    log: HandlerLog,
}

impl RecordingHandler {
    /// Creates a recording handler with its own log.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(Vec::new()),
            log: HandlerLog::default(),
        }
    }

    /// Creates a handler that also appends to a shared log, ready to register.
    #[must_use]
    pub fn shared(name: impl Into<String>, log: &HandlerLog) -> Arc<dyn HookHandler> {
        Arc::new(Self {
            log: log.clone(),
            ..Self::new(name)
        })
    }

    /// Returns the number of messages handled.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns the messages handled.
    #[must_use]
    pub fn messages(&self) -> Vec<JobMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl HookHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: &JobMessage) -> anyhow::Result<()> {
        self.log.push(&self.name);
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

/// A handler that always fails.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
    error: String,
    log: HandlerLog,
}

impl FailingHandler {
    /// Creates a failing handler.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            log: HandlerLog::default(),
        }
    }

    /// Creates a failing handler that appends to a shared log.
    #[must_use]
    pub fn shared(name: impl Into<String>, error: impl Into<String>, log: &HandlerLog) -> Arc<dyn HookHandler> {
        Arc::new(Self {
            log: log.clone(),
            ..Self::new(name, error)
        })
    }
}

#[async_trait]
impl HookHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _message: &JobMessage) -> anyhow::Result<()> {
        self.log.push(&self.name);
        anyhow::bail!("{}", self.error)
    }
}

/// A history provider serving canned histories.
#[derive(Debug, Default)]
pub struct InMemoryHistoryProvider {
    histories: Mutex<HashMap<String, Vec<ExecutionEvent>>>,
}

impl InMemoryHistoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the history of an execution, replacing any earlier one.
    pub fn insert(&self, handle: &ExecutionHandle, events: Vec<ExecutionEvent>) {
        self.histories.lock().insert(handle.as_str().to_string(), events);
    }
}

#[async_trait]
impl HistoryProvider for InMemoryHistoryProvider {
    async fn history(&self, handle: &ExecutionHandle) -> anyhow::Result<Vec<ExecutionEvent>> {
        self.histories
            .lock()
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("execution '{handle}' does not exist"))
    }
}

/// One call to [`RecordingExecutor::submit`].
#[derive(Debug, Clone)]
pub struct Submission {
    /// The execution name.
    pub name: String,
    /// The submitted definition.
    pub definition: GraphDefinition,
    /// The execution input.
    pub input: Value,
    /// The handle returned.
    pub handle: ExecutionHandle,
}

#[derive(Debug, Default)]
struct ExecutorState {
    submissions: Vec<Submission>,
    failure: Option<String>,
}

/// An executor that records submissions and hands out sequential handles.
///
/// Clones share their recordings.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<ExecutorState>>,
}

impl RecordingExecutor {
    /// Creates an executor that accepts every submission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor that rejects every submission.
    #[must_use]
    pub fn failing(error: impl Into<String>) -> Self {
        let executor = Self::new();
        executor.state.lock().failure = Some(error.into());
        executor
    }

    /// Returns the accepted submissions.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }
}

#[async_trait]
impl ExecutorClient for RecordingExecutor {
    async fn submit(&self, name: &str, definition: &GraphDefinition, input: &Value) -> anyhow::Result<ExecutionHandle> {
        let mut state = self.state.lock();
        if let Some(error) = &state.failure {
            anyhow::bail!("{error}");
        }

        let handle = ExecutionHandle::new(format!(
            "arn:aws:states:eu-west-1:000000000000:execution:{name}:{}",
            state.submissions.len() + 1
        ));
        state.submissions.push(Submission {
            name: name.to_string(),
            definition: definition.clone(),
            input: input.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }
}
