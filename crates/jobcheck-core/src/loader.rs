//! Reading job files into [`JobDocument`]s.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::LoadError;
use crate::model::{JobDocument, JobEntry, JobKind, JobSpec};
use crate::obs;

type Collection = IndexMap<String, Vec<JobSpec>>;

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default, deserialize_with = "repositories")]
    presubmits: Collection,
    #[serde(default, deserialize_with = "repositories")]
    postsubmits: Collection,
}

/// Read and validate the job file at `path`.
///
/// Fails with [`LoadError::NotFound`] when the file does not exist and with
/// [`LoadError::Parse`] when it is not a well-formed job document.
pub fn load(path: impl AsRef<Path>) -> Result<JobDocument, LoadError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading job file");
    let bytes = std::fs::read(path).map_err(|e| LoadError::from_io(path, e))?;
    let source = std::str::from_utf8(&bytes)
        .map_err(|e| LoadError::parse(path, format!("not valid UTF-8: {e}")))?;
    let document = parse_str(source, path)?;
    obs::emit_document_loaded(&document);
    Ok(document)
}

/// Parse job YAML already held in memory. `path` only labels errors and the
/// resulting document.
pub fn parse_str(source: &str, path: impl Into<PathBuf>) -> Result<JobDocument, LoadError> {
    let path = path.into();

    let mut value: serde_yaml::Value =
        serde_yaml::from_str(source).map_err(|e| LoadError::parse(&path, e.to_string()))?;
    // Job files share templates through anchors and `<<` merge keys.
    value
        .apply_merge()
        .map_err(|e| LoadError::parse(&path, e.to_string()))?;
    match value {
        serde_yaml::Value::Null => return Err(LoadError::parse(&path, "document is empty")),
        serde_yaml::Value::Mapping(_) => {}
        _ => {
            return Err(LoadError::parse(
                &path,
                "top level must be a mapping with `presubmits` and/or `postsubmits`",
            ))
        }
    }

    let raw = RawDocument::deserialize(value).map_err(|e| LoadError::parse(&path, e.to_string()))?;
    ensure_unique_names(JobKind::Presubmit, &raw.presubmits).map_err(|m| LoadError::parse(&path, m))?;
    ensure_unique_names(JobKind::Postsubmit, &raw.postsubmits).map_err(|m| LoadError::parse(&path, m))?;

    Ok(JobDocument {
        source: path,
        digest: compute_digest(source.as_bytes()),
        presubmits: raw.presubmits,
        postsubmits: raw.postsubmits,
    })
}

/// Every presubmit or postsubmit owned by one of `names`, in document order.
///
/// Unknown repository names are not an error; they just match nothing.
pub fn select_by_repository<'a, S: AsRef<str>>(
    document: &'a JobDocument,
    names: &[S],
) -> Vec<JobEntry<'a>> {
    document
        .entries()
        .filter(|entry| names.iter().any(|n| n.as_ref() == entry.repository))
        .collect()
}

fn ensure_unique_names(kind: JobKind, collection: &Collection) -> Result<(), String> {
    let mut seen = HashSet::new();
    for (repository, jobs) in collection {
        for job in jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(format!(
                    "duplicate {kind} job name `{}` (repository {repository})",
                    job.name
                ));
            }
        }
    }
    Ok(())
}

fn compute_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Deserialize a repository → jobs map, rejecting repeated repository keys
/// and accepting an explicit `null` as empty.
fn repositories<'de, D>(deserializer: D) -> Result<Collection, D::Error>
where
    D: Deserializer<'de>,
{
    struct RepositoriesVisitor;

    impl<'de> Visitor<'de> for RepositoriesVisitor {
        type Value = Collection;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of repository name to a list of jobs")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Collection::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut collection = Collection::new();
            while let Some((repository, jobs)) = map.next_entry::<String, Option<Vec<JobSpec>>>()? {
                if collection.contains_key(&repository) {
                    return Err(de::Error::custom(format_args!(
                        "duplicate repository `{repository}`"
                    )));
                }
                collection.insert(repository, jobs.unwrap_or_default());
            }
            Ok(collection)
        }
    }

    deserializer.deserialize_any(RepositoriesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = r#"
presubmits:
  kyma-project/examples:
    - name: pre-master-examples-orders-service
      branches:
        - ^master$
      max_concurrency: 10
      decorate: true
      path_alias: github.com/kyma-project/examples
postsubmits:
  kyma-project/examples:
    - name: post-master-examples-orders-service
      branches:
        - ^master$
      max_concurrency: 10
      decorate: true
"#;

    fn assert_parse_error(source: &str) {
        match parse_str(source, "jobs.yaml") {
            Err(LoadError::Parse { .. }) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_minimal_document() {
        let doc = parse_str(ORDERS, "jobs.yaml").expect("parse failed");
        assert_eq!(doc.presubmit_count(), 1);
        assert_eq!(doc.postsubmit_count(), 1);
        assert_eq!(doc.source(), Path::new("jobs.yaml"));
        assert_eq!(doc.digest().len(), 64);
    }

    #[test]
    fn test_defaults_for_omitted_fields() {
        let doc = parse_str(ORDERS, "jobs.yaml").expect("parse failed");
        let post = &doc.postsubmits()["kyma-project/examples"][0];
        assert!(!post.skip_report);
        assert!(post.path_alias.is_none());
        assert!(post.labels.is_empty());
        assert!(post.spec.is_none());
    }

    #[test]
    fn test_select_returns_both_collections_in_order() {
        let doc = parse_str(ORDERS, "jobs.yaml").expect("parse failed");
        let selected = select_by_repository(&doc, &["kyma-project/examples"]);
        let kinds: Vec<_> = selected.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![JobKind::Presubmit, JobKind::Postsubmit]);
    }

    #[test]
    fn test_select_unknown_repository_is_empty() {
        let doc = parse_str(ORDERS, "jobs.yaml").expect("parse failed");
        assert!(select_by_repository(&doc, &["kyma-project/kyma"]).is_empty());
        let none: [&str; 0] = [];
        assert!(select_by_repository(&doc, &none).is_empty());
    }

    #[test]
    fn test_null_collection_is_empty() {
        let doc = parse_str("presubmits:\npostsubmits: {}\n", "jobs.yaml").expect("parse failed");
        assert_eq!(doc.presubmit_count(), 0);
        assert_eq!(doc.postsubmit_count(), 0);
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = parse_str(ORDERS, "jobs.yaml").expect("parse failed");
        let b = parse_str(&format!("{ORDERS}\n# trailing comment\n"), "jobs.yaml").expect("parse failed");
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), compute_digest(ORDERS.as_bytes()));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert_parse_error("");
        assert_parse_error("# only a comment\n");
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        assert_parse_error("- just\n- a list\n");
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        assert_parse_error(
            "presubmits:\n  org/repo:\n    - name: a\n      max_concurrency: ten\n",
        );
        assert_parse_error("presubmits:\n  org/repo:\n    - name: a\n      max_concurrency: -1\n");
        assert_parse_error("presubmits:\n  org/repo:\n    - name: a\n      branches: master\n");
    }

    #[test]
    fn test_missing_name_rejected() {
        assert_parse_error("presubmits:\n  org/repo:\n    - decorate: true\n");
    }

    #[test]
    fn test_duplicate_job_name_rejected() {
        let source = r#"
presubmits:
  org/one:
    - name: build
  org/two:
    - name: build
"#;
        let err = parse_str(source, "jobs.yaml").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("duplicate presubmit job name `build`"));
    }

    #[test]
    fn test_same_name_across_collections_allowed() {
        let source = r#"
presubmits:
  org/one:
    - name: build
postsubmits:
  org/one:
    - name: build
"#;
        assert!(parse_str(source, "jobs.yaml").is_ok());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        assert_parse_error("presubmits:\n  org/repo:\n    - name: a\n      name: b\n");
    }

    #[test]
    fn test_merge_keys_are_applied() {
        let source = r#"
base: &base
  max_concurrency: 10
  decorate: true
presubmits:
  org/repo:
    - name: merged
      decorate: false
      <<: *base
"#;
        let doc = parse_str(source, "jobs.yaml").expect("parse failed");
        let job = &doc.presubmits()["org/repo"][0];
        assert_eq!(job.max_concurrency, 10);
        assert!(!job.decorate, "explicit keys win over merged ones");
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert_parse_error("presubmits: [unclosed\n");
    }
}
