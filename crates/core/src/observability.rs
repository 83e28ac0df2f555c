//! Observability utilities for standardized tracing spans and structured fields
//!
//! Helper functions and constants for consistent tracing across the core
//! workflows: drift detection, TransactFs commits, runtime adapter calls,
//! the network helper lifecycle, and sync-conflict surveillance.

use std::time::Instant;
use tracing::{span, Span};

/// Canonical span names for core workflows.
pub mod spans {
    pub const PROJECT_UP: &str = "project.up";
    pub const PROJECT_DOWN: &str = "project.down";
    pub const PROJECT_EXEC: &str = "project.exec";
    pub const DRIFT_DETECT: &str = "drift.detect";
    pub const TRANSACTFS_COMMIT: &str = "transactfs.commit";
    pub const NETWORK_INSTALL: &str = "network.install";
    pub const NETWORK_SETUP: &str = "network.setup";
    pub const NETWORK_TEARDOWN: &str = "network.teardown";
    pub const SYNC_REFRESH: &str = "sync.refresh";
    pub const ORPHAN_PURGE: &str = "orphan.purge";
}

/// Common field names for structured logging.
pub mod fields {
    pub const PROJECT_ID: &str = "project_id";
    pub const CONTAINER_ID: &str = "container_id";
    pub const CONTAINER_NAME: &str = "container_name";
    pub const OP_COUNT: &str = "op_count";
    pub const DURATION_MS: &str = "duration_ms";
}

/// Start a span for drift detection between stored and current configuration.
pub fn drift_detect_span(project_id: &str) -> Span {
    span!(
        target: "alca_core::observability",
        tracing::Level::INFO,
        spans::DRIFT_DETECT,
        duration_ms = tracing::field::Empty,
        project_id = %project_id,
    )
}

/// Start a span for a TransactFs commit, recording the number of staged ops.
pub fn transactfs_commit_span(op_count: usize) -> Span {
    span!(
        target: "alca_core::observability",
        tracing::Level::INFO,
        spans::TRANSACTFS_COMMIT,
        duration_ms = tracing::field::Empty,
        op_count = op_count,
    )
}

/// Start a span for the network helper's per-project setup/teardown lifecycle.
pub fn network_span(name: &'static str, project_path: &str) -> Span {
    span!(
        target: "alca_core::observability",
        tracing::Level::INFO,
        "network",
        { name },
        duration_ms = tracing::field::Empty,
        project_path = %project_path,
    )
}

/// Start a span for a sync-conflict cache refresh tick.
pub fn sync_refresh_span() -> Span {
    span!(
        target: "alca_core::observability",
        tracing::Level::DEBUG,
        spans::SYNC_REFRESH,
        duration_ms = tracing::field::Empty,
    )
}

/// Helper for recording duration on span completion.
pub struct TimedSpan {
    span: Span,
    start_time: Instant,
    _entered: tracing::span::EnteredSpan,
}

impl TimedSpan {
    /// Create a new timed span from an existing span.
    pub fn new(span: Span) -> Self {
        let entered = span.clone().entered();
        Self {
            span,
            start_time: Instant::now(),
            _entered: entered,
        }
    }

    /// Complete the span and record duration.
    pub fn complete(self) {
        let duration_ms = self.start_time.elapsed().as_millis() as u64;
        self.span.record(fields::DURATION_MS, duration_ms);
    }

    /// Get the underlying span for recording additional fields.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Macro to create and enter a standardized span with automatic timing.
#[macro_export]
macro_rules! timed_span {
    ($span_fn:expr) => {{
        let span = $span_fn;
        $crate::observability::TimedSpan::new(span)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_creation_does_not_panic() {
        let _span = drift_detect_span("abc123");
        let _span = transactfs_commit_span(3);
        let _span = network_span("setup", "/tmp/project");
    }

    #[test]
    fn test_timed_span_records_duration() {
        let timed = TimedSpan::new(transactfs_commit_span(1));
        std::thread::sleep(std::time::Duration::from_millis(5));
        timed.complete();
    }
}
