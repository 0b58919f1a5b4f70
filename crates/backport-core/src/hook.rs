//! Test seam invoked between branch creation and replay.

use async_trait::async_trait;

use crate::model::{BranchName, CommitSha};

/// Observer called once the working branch exists and before any commit is
/// replayed onto it.
///
/// This is a testing seam: production callers use [`NoopHook`], which the
/// orchestrator installs by default. Tests use it to inspect remote state or
/// to inject work at that exact point.
#[async_trait]
pub trait BackportHook: Send + Sync {
    async fn on_branch_created(&self, head: &BranchName, commits: &[CommitSha]);
}

/// Hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait]
impl BackportHook for NoopHook {
    async fn on_branch_created(&self, _head: &BranchName, _commits: &[CommitSha]) {}
}
