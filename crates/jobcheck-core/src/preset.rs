//! Well-known preset labels used by the Kyma job definitions.
//!
//! A preset is attached to a job by labelling it `<preset>: "true"`; the CI
//! platform then injects the matching environment and volumes.

/// Docker-in-Docker enabled.
pub const DIND_ENABLED: &str = "preset-dind-enabled";
/// Push target is the Kyma docker repository.
pub const DOCKER_PUSH_REPO_KYMA: &str = "preset-docker-push-repository-kyma";
/// Push target is the test-infra docker repository.
pub const DOCKER_PUSH_REPO_TEST_INFRA: &str = "preset-docker-push-repository-test-infra";
/// Service account allowed to push to GCR.
pub const GCR_PUSH: &str = "preset-sa-gcr-push";
/// Build triggered from a pull request.
pub const BUILD_PR: &str = "preset-build-pr";
/// Build triggered from the master branch.
pub const BUILD_MASTER: &str = "preset-build-master";
/// Build triggered from a release branch.
pub const BUILD_RELEASE: &str = "preset-build-release";
pub const KYMA_GUARD_BOT_GITHUB_TOKEN: &str = "preset-kyma-guard-bot-github-token";
pub const GC_PROJECT_ENV: &str = "preset-gc-project-env";
pub const SA_VM_KYMA_INTEGRATION: &str = "preset-sa-vm-kyma-integration";

/// Every preset name this module knows about.
pub const KNOWN: &[&str] = &[
    DIND_ENABLED,
    DOCKER_PUSH_REPO_KYMA,
    DOCKER_PUSH_REPO_TEST_INFRA,
    GCR_PUSH,
    BUILD_PR,
    BUILD_MASTER,
    BUILD_RELEASE,
    KYMA_GUARD_BOT_GITHUB_TOKEN,
    GC_PROJECT_ENV,
    SA_VM_KYMA_INTEGRATION,
];

/// Whether `name` is one of the presets in [`KNOWN`].
pub fn is_known(name: &str) -> bool {
    KNOWN.contains(&name)
}
