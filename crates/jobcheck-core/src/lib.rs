//! jobcheck core library
//!
//! Loads Prow-style CI job definitions and checks them against declarative
//! expectations:
//! - `loader`: job file → immutable [`JobDocument`], repository selection
//! - `checker`: per-job field expectations → [`Violation`]s
//! - `suite`: whole-file expectation suites → [`SuiteReport`]

pub mod checker;
pub mod error;
pub mod loader;
pub mod model;
pub mod obs;
pub mod preset;
pub mod suite;
pub mod telemetry;

pub use checker::{check, check_fail_fast, ensure_conformant, Expectation, Field, FieldValue, Violation};
pub use error::{ConformanceError, JobCheckError, LoadError, Result, SuiteError};
pub use loader::{load, parse_str, select_by_repository};
pub use model::{Container, ExtraRef, JobDocument, JobEntry, JobKind, JobSpec, PodSpec};
pub use suite::{load_suite, verify, ExpectationSuite, JobCounts, JobExpectations, JobOutcome, SuiteReport};
pub use telemetry::init_tracing;

/// jobcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
