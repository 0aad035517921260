//! Seams to external collaborators.
//!
//! The executor and its history store are external systems; only these
//! contracts are defined here.

use crate::assembler::GraphDefinition;
use crate::history::ExecutionEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque handle of one execution, issued by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    /// Wraps a raw handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the raw handle.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submits definitions to the executor.
#[async_trait]
pub trait ExecutorClient: Send + Sync {
    /// Registers `definition` under `name` and starts it with `input`.
    async fn submit(&self, name: &str, definition: &GraphDefinition, input: &Value) -> anyhow::Result<ExecutionHandle>;
}

/// Reads execution histories from the executor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Returns the full event history of an execution, oldest first.
    async fn history(&self, handle: &ExecutionHandle) -> anyhow::Result<Vec<ExecutionEvent>>;
}

#[async_trait]
impl<T: ExecutorClient + ?Sized> ExecutorClient for Arc<T> {
    async fn submit(&self, name: &str, definition: &GraphDefinition, input: &Value) -> anyhow::Result<ExecutionHandle> {
        (**self).submit(name, definition, input).await
    }
}

#[async_trait]
impl<T: HistoryProvider + ?Sized> HistoryProvider for Arc<T> {
    async fn history(&self, handle: &ExecutionHandle) -> anyhow::Result<Vec<ExecutionEvent>> {
        (**self).history(handle).await
    }
}
