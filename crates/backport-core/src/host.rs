//! Host API seam.
//!
//! Inject a real implementation that talks to the version-control host, or
//! [`crate::fakes::MemoryHost`] for tests.

use async_trait::async_trait;

use crate::error::HostResult;
use crate::model::{BranchName, CommitSha, NewPullRequest, PullRequest, PullRequestNumber, RepoId};

/// The host calls the orchestrator depends on.
///
/// Timeouts, authentication and rate limiting belong to the implementation.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Current tip of `branch`. Fails with `NotFound` if the branch is absent.
    async fn resolve_tip(&self, repo: &RepoId, branch: &BranchName) -> HostResult<CommitSha>;

    /// Commits of a pull request, oldest first.
    async fn list_commits(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<Vec<CommitSha>>;

    /// Create `branch` at `sha`. Fails with `Conflict` if it already exists.
    async fn create_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        sha: &CommitSha,
    ) -> HostResult<()>;

    /// Delete `branch`. Fails with `NotFound` if it is already gone.
    async fn delete_ref(&self, repo: &RepoId, branch: &BranchName) -> HostResult<()>;

    async fn get_pull_request(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<PullRequest>;

    /// Open a pull request. Fails with `Conflict` if an equivalent one exists
    /// or the head has nothing to merge.
    async fn create_pull_request(
        &self,
        repo: &RepoId,
        pull_request: &NewPullRequest,
    ) -> HostResult<PullRequestNumber>;
}
