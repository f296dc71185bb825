//! Field-level conformance checks for a single job.
//!
//! Evaluates a [`JobSpec`] against a list of [`Expectation`]s and returns
//! every [`Violation`]. Scalars compare exactly, sequences compare element by
//! element in order, and presets compare as sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConformanceError;
use crate::model::JobSpec;

// ---------------------------------------------------------------------------
// Fields and values
// ---------------------------------------------------------------------------

/// A checkable job field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Branches,
    MaxConcurrency,
    SkipReport,
    Decorate,
    AlwaysRun,
    PathAlias,
    RunIfChanged,
    /// Image of the first container.
    Image,
    /// Command of the first container.
    Command,
    /// Args of the first container.
    Args,
}

impl Field {
    /// Path of the field inside the job definition, as reported in violations.
    pub fn path(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Branches => "branches",
            Field::MaxConcurrency => "max_concurrency",
            Field::SkipReport => "skip_report",
            Field::Decorate => "decorate",
            Field::AlwaysRun => "always_run",
            Field::PathAlias => "path_alias",
            Field::RunIfChanged => "run_if_changed",
            Field::Image => "spec.containers[0].image",
            Field::Command => "spec.containers[0].command",
            Field::Args => "spec.containers[0].args",
        }
    }

    /// Read this field from `job`.
    pub fn read(&self, job: &JobSpec) -> FieldValue {
        match self {
            Field::Name => FieldValue::Text(job.name.clone()),
            Field::Branches => FieldValue::List(job.branches.clone()),
            Field::MaxConcurrency => FieldValue::Integer(u64::from(job.max_concurrency)),
            Field::SkipReport => FieldValue::Flag(job.skip_report),
            Field::Decorate => FieldValue::Flag(job.decorate),
            Field::AlwaysRun => FieldValue::Flag(job.always_run),
            Field::PathAlias => job.path_alias.clone().into(),
            Field::RunIfChanged => job.run_if_changed.clone().into(),
            Field::Image => job
                .primary_container()
                .map(|c| c.image.clone())
                .into(),
            Field::Command => job
                .primary_container()
                .map(|c| c.command.clone())
                .into(),
            Field::Args => job
                .primary_container()
                .map(|c| c.args.clone())
                .into(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// An expected or observed field value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldValue {
    /// The field is not set (`null` in expectation files).
    Absent,
    Flag(bool),
    Integer(u64),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Absent => f.write_str("<absent>"),
            FieldValue::Flag(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v:?}"),
            FieldValue::List(items) => write!(f, "{items:?}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(u64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::List(v)
    }
}

impl From<&[&str]> for FieldValue {
    fn from(v: &[&str]) -> Self {
        FieldValue::List(v.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Absent, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Expectations
// ---------------------------------------------------------------------------

/// A single declarative expectation about a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// `field` must equal `value` exactly (ordered for sequences).
    Equals { field: Field, value: FieldValue },

    /// Every listed preset must be attached. With `exhaustive`, no other
    /// preset may be attached either.
    HasPresets {
        presets: Vec<String>,
        #[serde(default)]
        exhaustive: bool,
    },

    /// An extra ref with these coordinates must be cloned alongside the job.
    HasExtraRef {
        org: String,
        repo: String,
        base_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path_alias: Option<String>,
    },
}

impl Expectation {
    pub fn equals(field: Field, value: impl Into<FieldValue>) -> Self {
        Expectation::Equals {
            field,
            value: value.into(),
        }
    }

    /// Subset match: the listed presets must be present, others are ignored.
    pub fn has_presets<I, S>(presets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expectation::HasPresets {
            presets: presets.into_iter().map(Into::into).collect(),
            exhaustive: false,
        }
    }

    /// Exact match: the attached presets must be exactly the listed ones.
    pub fn has_exactly_presets<I, S>(presets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expectation::HasPresets {
            presets: presets.into_iter().map(Into::into).collect(),
            exhaustive: true,
        }
    }

    pub fn has_extra_ref(
        org: impl Into<String>,
        repo: impl Into<String>,
        base_ref: impl Into<String>,
    ) -> Self {
        Expectation::HasExtraRef {
            org: org.into(),
            repo: repo.into(),
            base_ref: base_ref.into(),
            path_alias: None,
        }
    }

    /// Also require the extra ref to be checked out under `path_alias`.
    /// No effect on other expectation kinds.
    pub fn with_path_alias(mut self, alias: impl Into<String>) -> Self {
        if let Expectation::HasExtraRef { path_alias, .. } = &mut self {
            *path_alias = Some(alias.into());
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// A field whose actual value does not match what was expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    /// Path of the offending field, e.g. `max_concurrency`.
    pub field: String,
    pub expected: FieldValue,
    pub actual: FieldValue,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Check `job` against every expectation, collecting all violations.
///
/// An empty result means the job conforms.
pub fn check(job: &JobSpec, expectations: &[Expectation]) -> Vec<Violation> {
    expectations
        .iter()
        .filter_map(|expectation| check_one(job, expectation))
        .collect()
}

/// Like [`check`], but stops at the first violation.
pub fn check_fail_fast(job: &JobSpec, expectations: &[Expectation]) -> Option<Violation> {
    expectations
        .iter()
        .find_map(|expectation| check_one(job, expectation))
}

/// Check `job` and turn any violation into a [`ConformanceError`].
pub fn ensure_conformant(job: &JobSpec, expectations: &[Expectation]) -> Result<(), ConformanceError> {
    let violations = check(job, expectations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ConformanceError {
            job: job.name.clone(),
            violations,
        })
    }
}

fn check_one(job: &JobSpec, expectation: &Expectation) -> Option<Violation> {
    match expectation {
        Expectation::Equals { field, value } => {
            let actual = field.read(job);
            (actual != *value).then(|| Violation {
                field: field.path().to_string(),
                expected: value.clone(),
                actual,
            })
        }
        Expectation::HasPresets {
            presets,
            exhaustive,
        } => {
            let attached = job.presets();
            let required: BTreeSet<&str> = presets.iter().map(String::as_str).collect();
            // Subset failures name only the missing presets.
            let expected = if *exhaustive {
                (attached != required).then_some(required)
            } else {
                let missing: BTreeSet<&str> = required.difference(&attached).copied().collect();
                (!missing.is_empty()).then_some(missing)
            };
            expected.map(|expected| Violation {
                field: "presets".to_string(),
                expected: sorted_list(expected),
                actual: sorted_list(attached),
            })
        }
        Expectation::HasExtraRef {
            org,
            repo,
            base_ref,
            path_alias,
        } => {
            let found = job.extra_refs.iter().any(|extra| {
                &extra.org == org
                    && &extra.repo == repo
                    && &extra.base_ref == base_ref
                    && (path_alias.is_none() || extra.path_alias == *path_alias)
            });
            let expected = match path_alias {
                Some(alias) => format!("{org}/{repo}@{base_ref} ({alias})"),
                None => format!("{org}/{repo}@{base_ref}"),
            };
            (!found).then(|| Violation {
                field: "extra_refs".to_string(),
                expected: FieldValue::Text(expected),
                actual: FieldValue::List(job.extra_refs.iter().map(ToString::to_string).collect()),
            })
        }
    }
}

fn sorted_list(set: BTreeSet<&str>) -> FieldValue {
    FieldValue::List(set.into_iter().map(str::to_string).collect())
}
