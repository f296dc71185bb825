//! Structured log events for document loads and suite verification.
//!
//! Emitted at `info!` (or `warn!` for failures) with an `event` field so log
//! pipelines can filter on it.

use tracing::{info, warn};

use crate::model::JobDocument;
use crate::suite::SuiteReport;

/// Emit event: a job file was loaded.
pub fn emit_document_loaded(document: &JobDocument) {
    info!(
        event = "document.loaded",
        path = %document.source().display(),
        digest = %document.digest(),
        presubmits = document.presubmit_count(),
        postsubmits = document.postsubmit_count(),
    );
}

/// Emit event: a suite finished evaluating.
pub fn emit_suite_verified(report: &SuiteReport) {
    if report.passed {
        info!(
            event = "suite.verified",
            path = %report.source.display(),
            jobs = report.outcomes.len(),
            passed = true,
        );
    } else {
        warn!(
            event = "suite.verified",
            path = %report.source.display(),
            jobs = report.outcomes.len(),
            violations = report.violation_count(),
            passed = false,
        );
    }
}
