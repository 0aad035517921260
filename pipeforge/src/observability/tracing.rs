//! Span attributes and timing for pipeforge operations.
//!
//! Attributes render to flat OpenTelemetry-style maps so callers can attach
//! them to whatever spans or exporters they run.

use crate::context::PipelineContext;
use crate::interfaces::ExecutionHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Span attributes describing one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Experiment id.
    pub experiment_id: String,
    /// Process name.
    pub process: String,
    /// Sandbox id.
    pub sandbox_id: String,
    /// Deployment environment.
    pub environment: String,
    /// Execution handle, once launched.
    pub execution: Option<String>,
    /// Definition fingerprint, once assembled.
    pub fingerprint: Option<String>,
}

impl RunSpanAttributes {
    /// Captures the attributes of a run context.
    #[must_use]
    pub fn from_context(ctx: &PipelineContext) -> Self {
        let identity = ctx.identity();
        Self {
            experiment_id: identity.experiment_id.clone(),
            process: ctx.process().as_str().to_string(),
            sandbox_id: identity.sandbox_id.clone(),
            environment: identity.environment.clone(),
            execution: None,
            fingerprint: None,
        }
    }

    /// Sets the execution handle.
    #[must_use]
    pub fn with_execution(mut self, handle: &ExecutionHandle) -> Self {
        self.execution = Some(handle.as_str().to_string());
        self
    }

    /// Sets the definition fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Converts to OpenTelemetry attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("pipeline.experiment_id".to_string(), self.experiment_id.clone());
        attrs.insert("pipeline.process".to_string(), self.process.clone());
        attrs.insert("pipeline.sandbox_id".to_string(), self.sandbox_id.clone());
        attrs.insert("deployment.environment".to_string(), self.environment.clone());

        if let Some(ref v) = self.execution {
            attrs.insert("pipeline.execution".to_string(), v.clone());
        }
        if let Some(ref v) = self.fingerprint {
            attrs.insert("pipeline.fingerprint".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: &'static str,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::qc_context;

    #[test]
    fn test_run_span_attributes() {
        let attrs = RunSpanAttributes::from_context(&qc_context(&["s1"]))
            .with_execution(&ExecutionHandle::new("exec-1"))
            .with_fingerprint("abc");

        let otel = attrs.to_otel_attributes();
        assert_eq!(otel.get("pipeline.process"), Some(&"qc".to_string()));
        assert_eq!(otel.get("pipeline.execution"), Some(&"exec-1".to_string()));
        assert_eq!(otel.get("pipeline.fingerprint"), Some(&"abc".to_string()));
        assert_eq!(otel.len(), 6);
    }

    #[test]
    fn test_unlaunched_run_has_no_execution() {
        let otel = RunSpanAttributes::from_context(&qc_context(&[])).to_otel_attributes();
        assert!(!otel.contains_key("pipeline.execution"));
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("test_span");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.name(), "test_span");
        let duration = timer.finish();
        assert!(duration >= 10.0);
    }
}
