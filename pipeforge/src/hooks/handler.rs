//! Hook handler trait and closure adapter.

use super::message::JobMessage;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// Business logic run for an inbound job message.
///
/// Handlers may perform side effects and may fail; a failure is reported to
/// the dispatcher's caller without stopping other handlers.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Returns the handler name used in logs and error reports.
    fn name(&self) -> &str;

    /// Handles one message.
    async fn handle(&self, message: &JobMessage) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`HookHandler`].
///
/// The closure receives its own copy of the message.
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F> {
    /// Creates a named handler from a closure.
    #[must_use]
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> HookHandler for FnHandler<F>
where
    F: Fn(JobMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: &JobMessage) -> anyhow::Result<()> {
        (self.func)(message.clone()).await
    }
}
