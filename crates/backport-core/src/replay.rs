//! Commit replay (cherry-pick) seam.

use async_trait::async_trait;

use crate::error::ReplayError;
use crate::model::{BranchName, CommitSha, RepoId};

/// Applies commits, in order, on top of a branch and advances it.
#[async_trait]
pub trait CommitReplayer: Send + Sync {
    /// Replay `commits` onto `head` and return the resulting tip.
    ///
    /// Implementations must apply every commit exactly once, in the order
    /// given, and fail with [`ReplayError::Conflict`] on the first commit that
    /// does not apply cleanly.
    async fn replay(
        &self,
        repo: &RepoId,
        commits: &[CommitSha],
        head: &BranchName,
    ) -> Result<CommitSha, ReplayError>;
}
