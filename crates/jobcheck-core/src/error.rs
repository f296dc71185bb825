//! Error taxonomy for loading job files and judging them.

use std::path::PathBuf;

use crate::checker::Violation;

/// Errors produced while reading a job definition file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("job file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed job file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to read job file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Errors produced while reading an expectation suite.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("expectation suite not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed expectation suite {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to read expectation suite {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SuiteError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// A job that does not match its expectations.
#[derive(Debug, thiserror::Error)]
#[error(
    "job {job} violates {} expectation(s): {}",
    self.violations.len(),
    render(&self.violations)
)]
pub struct ConformanceError {
    pub job: String,
    pub violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Umbrella error for callers that drive a whole load-and-check flow.
#[derive(Debug, thiserror::Error)]
pub enum JobCheckError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error(transparent)]
    Conformance(#[from] ConformanceError),
}

/// Result type for jobcheck operations.
pub type Result<T> = std::result::Result<T, JobCheckError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::FieldValue;

    #[test]
    fn test_not_found_from_io_kind() {
        let err = LoadError::from_io(
            "jobs/missing.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(err.to_string().contains("jobs/missing.yaml"));
    }

    #[test]
    fn test_other_io_kinds_stay_io() {
        let err = SuiteError::from_io(
            "suite.yaml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, SuiteError::Io { .. }));
    }

    #[test]
    fn test_conformance_error_lists_every_violation() {
        let err = ConformanceError {
            job: "pre-master-examples-orders-service".to_string(),
            violations: vec![
                Violation {
                    field: "max_concurrency".to_string(),
                    expected: FieldValue::Integer(10),
                    actual: FieldValue::Integer(5),
                },
                Violation {
                    field: "decorate".to_string(),
                    expected: FieldValue::Flag(true),
                    actual: FieldValue::Flag(false),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 expectation(s)"));
        assert!(msg.contains("max_concurrency: expected 10, got 5"));
        assert!(msg.contains("decorate: expected true, got false"));
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: JobCheckError = LoadError::parse("a.yaml", "bad indent").into();
        assert!(matches!(err, JobCheckError::Load(LoadError::Parse { .. })));
        assert!(err.to_string().contains("bad indent"));
    }
}
