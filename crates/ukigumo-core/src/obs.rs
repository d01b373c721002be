//! Structured observability hooks for the run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span, [`run_span`]
//! - Emission functions for lifecycle events: start, step, finish, report
//!
//! Events are emitted at `info!` level unless noted. Filtering follows
//! `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use std::path::Path;

use tracing::info;

use crate::build_system::BuildSystem;
use crate::status::Status;

/// The project-scoped span.
///
/// Runs await across it, so attach it with [`tracing::Instrument::instrument`]
/// rather than holding an entered guard.
///
/// ```ignore
/// pipeline.instrument(run_span("Acme-Failing")).await;
/// // every event inside carries project = "Acme-Failing"
/// ```
pub fn run_span(project: &str) -> tracing::Span {
    tracing::info_span!("ukigumo.run", project = %project)
}

/// Emit event: build system detected and run starting.
pub fn emit_run_started(dir: &Path, build_system: BuildSystem) {
    info!(
        event = "run.started",
        dir = %dir.display(),
        build_system = build_system.name(),
    );
}

/// Emit event: a single step finished.
pub fn emit_step_finished(build_system: BuildSystem, step: usize, success: bool) {
    info!(
        event = "step.finished",
        build_system = build_system.name(),
        step = step,
        success = success,
    );
}

/// Emit event: run reached its terminal status.
pub fn emit_run_finished(dir: &Path, status: Status, duration_ms: u64) {
    info!(
        event = "run.finished",
        dir = %dir.display(),
        status = %status,
        code = status.code(),
        duration_ms = duration_ms,
    );
}

/// Emit event: collector accepted a report.
pub fn emit_report_sent(endpoint: &str, status: Status, http_status: u16) {
    info!(
        event = "report.sent",
        endpoint = %endpoint,
        status = %status,
        http_status = http_status,
    );
}

/// Emit event: report delivery failed (error level).
pub fn emit_report_failed(endpoint: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "report.failed", endpoint = %endpoint, error = %error);
}
