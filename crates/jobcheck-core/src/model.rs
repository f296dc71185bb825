//! Typed records for Prow-style job definitions.
//!
//! A job file has two top-level collections, `presubmits` and `postsubmits`,
//! each mapping an `org/repo` name to the jobs it owns. Keys a job carries
//! beyond the ones modelled here are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Label prefix that marks a preset attachment.
pub const PRESET_LABEL_PREFIX: &str = "preset-";

/// Whether a job runs before or after a change merges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Presubmit,
    Postsubmit,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Presubmit => "presubmit",
            JobKind::Postsubmit => "postsubmit",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// An additional repository cloned next to the job's own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtraRef {
    pub org: String,
    pub repo: String,
    pub base_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_alias: Option<String>,
}

impl fmt::Display for ExtraRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.org, self.repo, self.base_ref)?;
        if let Some(alias) = &self.path_alias {
            write!(f, " ({alias})")?;
        }
        Ok(())
    }
}

/// One container of a job's pod.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// The pod a job runs in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// A single presubmit or postsubmit job entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSpec {
    pub name: String,

    /// Branch regexes the job triggers on, in file order.
    #[serde(default)]
    pub branches: Vec<String>,

    /// Maximum number of concurrent runs; 0 means unlimited.
    #[serde(default)]
    pub max_concurrency: u32,

    #[serde(default)]
    pub skip_report: bool,

    /// Whether pod utilities decorate the job.
    #[serde(default)]
    pub decorate: bool,

    #[serde(default)]
    pub always_run: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_alias: Option<String>,

    /// Regex over changed file paths that triggers the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_if_changed: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub extra_refs: Vec<ExtraRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PodSpec>,
}

impl JobSpec {
    /// Presets attached through `preset-*: "true"` labels.
    pub fn presets(&self) -> BTreeSet<&str> {
        self.labels
            .iter()
            .filter(|(key, value)| key.starts_with(PRESET_LABEL_PREFIX) && value.as_str() == "true")
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn has_preset(&self, preset: &str) -> bool {
        self.presets().contains(preset)
    }

    /// The first container of the pod, which carries the job's entry point.
    pub fn primary_container(&self) -> Option<&Container> {
        self.spec.as_ref().and_then(|spec| spec.containers.first())
    }
}

/// A job together with the collection and repository that own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEntry<'a> {
    pub kind: JobKind,
    pub repository: &'a str,
    pub job: &'a JobSpec,
}

/// A parsed job file.
///
/// Built only by the loader and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDocument {
    pub(crate) source: PathBuf,
    pub(crate) digest: String,
    pub(crate) presubmits: IndexMap<String, Vec<JobSpec>>,
    pub(crate) postsubmits: IndexMap<String, Vec<JobSpec>>,
}

impl JobDocument {
    /// Path the document was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// SHA-256 hex digest of the raw file bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn presubmits(&self) -> &IndexMap<String, Vec<JobSpec>> {
        &self.presubmits
    }

    pub fn postsubmits(&self) -> &IndexMap<String, Vec<JobSpec>> {
        &self.postsubmits
    }

    pub fn presubmit_count(&self) -> usize {
        self.presubmits.values().map(Vec::len).sum()
    }

    pub fn postsubmit_count(&self) -> usize {
        self.postsubmits.values().map(Vec::len).sum()
    }

    /// Every job in document order: presubmits first, then postsubmits.
    pub fn entries(&self) -> impl Iterator<Item = JobEntry<'_>> {
        let pre = flatten(JobKind::Presubmit, &self.presubmits);
        let post = flatten(JobKind::Postsubmit, &self.postsubmits);
        pre.chain(post)
    }

    /// Presubmits owned by any of `repositories`.
    pub fn presubmits_for<S: AsRef<str>>(&self, repositories: &[S]) -> Vec<&JobSpec> {
        owned_by(&self.presubmits, repositories)
    }

    /// Postsubmits owned by any of `repositories`.
    pub fn postsubmits_for<S: AsRef<str>>(&self, repositories: &[S]) -> Vec<&JobSpec> {
        owned_by(&self.postsubmits, repositories)
    }

    /// Look a job up by name within one collection.
    pub fn find(&self, kind: JobKind, name: &str) -> Option<JobEntry<'_>> {
        self.entries()
            .find(|entry| entry.kind == kind && entry.job.name == name)
    }
}

fn flatten(
    kind: JobKind,
    collection: &IndexMap<String, Vec<JobSpec>>,
) -> impl Iterator<Item = JobEntry<'_>> {
    collection.iter().flat_map(move |(repository, jobs)| {
        jobs.iter().map(move |job| JobEntry {
            kind,
            repository: repository.as_str(),
            job,
        })
    })
}

fn owned_by<'a, S: AsRef<str>>(
    collection: &'a IndexMap<String, Vec<JobSpec>>,
    repositories: &[S],
) -> Vec<&'a JobSpec> {
    collection
        .iter()
        .filter(|(repository, _)| repositories.iter().any(|r| r.as_ref() == repository.as_str()))
        .flat_map(|(_, jobs)| jobs.iter())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> JobSpec {
        JobSpec {
            name: name.to_string(),
            branches: vec!["^master$".to_string()],
            max_concurrency: 10,
            skip_report: false,
            decorate: true,
            always_run: false,
            path_alias: None,
            run_if_changed: None,
            labels: BTreeMap::new(),
            extra_refs: Vec::new(),
            spec: None,
        }
    }

    fn document() -> JobDocument {
        let mut presubmits = IndexMap::new();
        presubmits.insert("kyma-project/examples".to_string(), vec![job("pre-a")]);
        presubmits.insert("kyma-project/kyma".to_string(), vec![job("pre-b")]);
        let mut postsubmits = IndexMap::new();
        postsubmits.insert("kyma-project/examples".to_string(), vec![job("post-a")]);
        JobDocument {
            source: PathBuf::from("jobs.yaml"),
            digest: "00".to_string(),
            presubmits,
            postsubmits,
        }
    }

    #[test]
    fn test_presets_only_count_true_preset_labels() {
        let mut job = job("pre-a");
        job.labels.insert("preset-dind-enabled".to_string(), "true".to_string());
        job.labels.insert("preset-build-pr".to_string(), "false".to_string());
        job.labels.insert("owner".to_string(), "true".to_string());

        let presets = job.presets();
        assert_eq!(presets.len(), 1);
        assert!(job.has_preset("preset-dind-enabled"));
        assert!(!job.has_preset("preset-build-pr"));
    }

    #[test]
    fn test_primary_container_absent_without_spec() {
        let mut job = job("pre-a");
        assert!(job.primary_container().is_none());

        job.spec = Some(PodSpec {
            containers: vec![Container {
                image: "golang:1.14".to_string(),
                ..Container::default()
            }],
        });
        assert_eq!(job.primary_container().map(|c| c.image.as_str()), Some("golang:1.14"));
    }

    #[test]
    fn test_entries_are_in_document_order() {
        let doc = document();
        let names: Vec<_> = doc.entries().map(|e| e.job.name.as_str()).collect();
        assert_eq!(names, vec!["pre-a", "pre-b", "post-a"]);
        assert_eq!(doc.presubmit_count(), 2);
        assert_eq!(doc.postsubmit_count(), 1);
    }

    #[test]
    fn test_collection_filters_by_repository() {
        let doc = document();
        let pre = doc.presubmits_for(&["kyma-project/kyma"]);
        assert_eq!(pre.len(), 1);
        assert_eq!(pre[0].name, "pre-b");
        assert!(doc.postsubmits_for(&["kyma-project/kyma"]).is_empty());
    }

    #[test]
    fn test_find_respects_kind() {
        let doc = document();
        assert!(doc.find(JobKind::Presubmit, "post-a").is_none());
        let entry = doc.find(JobKind::Postsubmit, "post-a").expect("post-a exists");
        assert_eq!(entry.repository, "kyma-project/examples");
    }

    #[test]
    fn test_extra_ref_display() {
        let extra = ExtraRef {
            org: "kyma-project".to_string(),
            repo: "test-infra".to_string(),
            base_ref: "master".to_string(),
            path_alias: Some("github.com/kyma-project/test-infra".to_string()),
        };
        assert_eq!(
            extra.to_string(),
            "kyma-project/test-infra@master (github.com/kyma-project/test-infra)"
        );
    }
}
