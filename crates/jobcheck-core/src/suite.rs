//! Declarative expectation suites over a whole job file.
//!
//! A suite names the repositories under test, the number of jobs each
//! collection should hold for them, and per-job expectation lists:
//!
//! ```yaml
//! repositories: [kyma-project/examples]
//! counts:
//!   presubmits: 1
//!   postsubmits: 1
//! jobs:
//!   - kind: presubmit
//!     name: pre-master-examples-orders-service
//!     expect:
//!       - { type: equals, field: max_concurrency, value: 10 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::checker::{check, check_fail_fast, Expectation, FieldValue, Violation};
use crate::error::SuiteError;
use crate::loader::select_by_repository;
use crate::model::{JobDocument, JobEntry, JobKind};
use crate::{obs, preset};

/// Expected number of jobs per collection, counted after repository filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presubmits: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postsubmits: Option<usize>,
}

/// Expectations for one named job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobExpectations {
    pub kind: JobKind,
    pub name: String,
    #[serde(default)]
    pub expect: Vec<Expectation>,
}

/// A full set of expectations for a job file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpectationSuite {
    /// Repositories whose jobs are under test. Empty means every repository.
    #[serde(default)]
    pub repositories: Vec<String>,

    #[serde(default)]
    pub counts: JobCounts,

    /// Stop checking a job at its first violation.
    #[serde(default)]
    pub fail_fast: bool,

    #[serde(default)]
    pub jobs: Vec<JobExpectations>,
}

impl ExpectationSuite {
    pub fn from_yaml_str(source: &str, path: impl Into<PathBuf>) -> Result<Self, SuiteError> {
        serde_yaml::from_str(source).map_err(|e| SuiteError::Parse {
            path: path.into(),
            message: e.to_string(),
        })
    }

    /// Start a suite scoped to the given repositories.
    pub fn for_repositories<I, S>(repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            repositories: repositories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_counts(mut self, presubmits: usize, postsubmits: usize) -> Self {
        self.counts = JobCounts {
            presubmits: Some(presubmits),
            postsubmits: Some(postsubmits),
        };
        self
    }

    pub fn with_job(
        mut self,
        kind: JobKind,
        name: impl Into<String>,
        expect: Vec<Expectation>,
    ) -> Self {
        self.jobs.push(JobExpectations {
            kind,
            name: name.into(),
            expect,
        });
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Read an expectation suite from disk.
pub fn load_suite(path: impl AsRef<Path>) -> Result<ExpectationSuite, SuiteError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SuiteError::from_io(path, e))?;
    let source = std::str::from_utf8(&bytes).map_err(|e| SuiteError::Parse {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {e}"),
    })?;
    ExpectationSuite::from_yaml_str(source, path)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome for one job named by the suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobOutcome {
    pub kind: JobKind,
    pub name: String,
    /// Owning repository; `None` when the job was not found.
    pub repository: Option<String>,
    pub violations: Vec<Violation>,
}

impl JobOutcome {
    pub fn found(&self) -> bool {
        self.repository.is_some()
    }

    pub fn passed(&self) -> bool {
        self.found() && self.violations.is_empty()
    }
}

/// Result of verifying a suite against a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteReport {
    pub source: PathBuf,
    pub document_digest: String,
    /// Violations of the suite's job counts.
    pub count_violations: Vec<Violation>,
    pub outcomes: Vec<JobOutcome>,
    pub passed: bool,
}

impl SuiteReport {
    /// Count and field violations, plus one per missing job.
    pub fn violation_count(&self) -> usize {
        self.count_violations.len()
            + self
                .outcomes
                .iter()
                .map(|o| o.violations.len() + usize::from(!o.found()))
                .sum::<usize>()
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}

/// Evaluate `suite` against `document`.
///
/// Jobs are looked up only among those owned by the suite's repositories.
pub fn verify(suite: &ExpectationSuite, document: &JobDocument) -> SuiteReport {
    let selected: Vec<JobEntry<'_>> = if suite.repositories.is_empty() {
        document.entries().collect()
    } else {
        select_by_repository(document, &suite.repositories)
    };

    let mut count_violations = Vec::new();
    for (kind, expected) in [
        (JobKind::Presubmit, suite.counts.presubmits),
        (JobKind::Postsubmit, suite.counts.postsubmits),
    ] {
        let Some(expected) = expected else { continue };
        let actual = selected.iter().filter(|e| e.kind == kind).count();
        if actual != expected {
            count_violations.push(Violation {
                field: format!("{kind}s"),
                expected: FieldValue::Integer(expected as u64),
                actual: FieldValue::Integer(actual as u64),
            });
        }
    }

    let outcomes: Vec<JobOutcome> = suite
        .jobs
        .iter()
        .map(|expectations| verify_job(suite.fail_fast, expectations, &selected))
        .collect();

    let passed = count_violations.is_empty() && outcomes.iter().all(JobOutcome::passed);
    let report = SuiteReport {
        source: document.source().to_path_buf(),
        document_digest: document.digest().to_string(),
        count_violations,
        outcomes,
        passed,
    };
    obs::emit_suite_verified(&report);
    report
}

fn verify_job(fail_fast: bool, expectations: &JobExpectations, selected: &[JobEntry<'_>]) -> JobOutcome {
    warn_unknown_presets(expectations);

    let entry = selected
        .iter()
        .find(|e| e.kind == expectations.kind && e.job.name == expectations.name);

    let Some(entry) = entry else {
        return JobOutcome {
            kind: expectations.kind,
            name: expectations.name.clone(),
            repository: None,
            violations: Vec::new(),
        };
    };

    let violations = if fail_fast {
        check_fail_fast(entry.job, &expectations.expect).into_iter().collect()
    } else {
        check(entry.job, &expectations.expect)
    };

    JobOutcome {
        kind: entry.kind,
        name: entry.job.name.clone(),
        repository: Some(entry.repository.to_string()),
        violations,
    }
}

fn warn_unknown_presets(expectations: &JobExpectations) {
    for expectation in &expectations.expect {
        if let Expectation::HasPresets { presets, .. } = expectation {
            for name in presets.iter().filter(|p| !preset::is_known(p)) {
                warn!(job = %expectations.name, preset = %name, "expectation names an unknown preset");
            }
        }
    }
}
