//! Testing utilities for pipeforge.
//!
//! This module provides:
//! - Run contexts for each process kind
//! - A builder for parent-linked execution histories
//! - Recording hook handlers and in-memory collaborators

mod fixtures;
mod history;
mod mocks;

pub use fixtures::{
    gem2s_context, qc_context, subset_context, test_identity, TEST_ACCOUNT, TEST_ACTIVITY, TEST_CREDENTIAL,
};
pub use history::HistoryBuilder;
pub use mocks::{
    FailingHandler, HandlerLog, InMemoryHistoryProvider, RecordingExecutor, RecordingHandler, Submission,
};
