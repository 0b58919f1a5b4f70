//! Error taxonomy for backport operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BranchName, CommitSha};

/// Errors reported by a [`crate::host::HostApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The branch or pull request does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Creation collided with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Connectivity, authentication or rate-limit failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl HostError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::NotFound(_) => ErrorKind::NotFound,
            HostError::Conflict(_) => ErrorKind::Conflict,
            HostError::Transport(_) => ErrorKind::TransportFailure,
        }
    }
}

/// Convenience result alias for host calls.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Errors reported by a [`crate::replay::CommitReplayer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// A commit could not be applied cleanly on top of the current tip.
    #[error("commit {commit} does not apply cleanly: {detail}")]
    Conflict { commit: CommitSha, detail: String },

    /// The host failed while replaying.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Classification of a failure, independent of the step it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ReplayFailure,
    CompensationFailure,
    TransportFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ReplayFailure => "replay failure",
            ErrorKind::CompensationFailure => "compensation failure",
            ErrorKind::TransportFailure => "transport failure",
        };
        f.write_str(s)
    }
}

/// Remote step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FetchPullRequest,
    ResolveBase,
    ListCommits,
    CreateBranch,
    Replay,
    CreatePullRequest,
    DeleteBranch,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::FetchPullRequest => "fetch pull request",
            Step::ResolveBase => "resolve base",
            Step::ListCommits => "list commits",
            Step::CreateBranch => "create branch",
            Step::Replay => "replay",
            Step::CreatePullRequest => "create pull request",
            Step::DeleteBranch => "delete branch",
        };
        f.write_str(s)
    }
}

/// Error returned by [`crate::orchestrator::Backporter::backport`].
///
/// Always the primary cause. A failed rollback is reported through the
/// diagnostic sink and never takes the place of this error.
#[derive(Debug, Error)]
pub enum BackportError {
    /// A host call failed.
    #[error("{step} `{target}` failed: {source}")]
    Host {
        step: Step,
        target: String,
        #[source]
        source: HostError,
    },

    /// The commits could not be replayed onto the working branch.
    #[error(
        "commits {} could not be cherry-picked on top of {}",
        list_commits(.commits),
        .base
    )]
    ReplayFailed {
        commits: Vec<CommitSha>,
        base: BranchName,
        #[source]
        source: ReplayError,
    },
}

impl BackportError {
    pub(crate) fn host(step: Step, target: impl fmt::Display, source: HostError) -> Self {
        BackportError::Host {
            step,
            target: target.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BackportError::Host { source, .. } => source.kind(),
            BackportError::ReplayFailed { .. } => ErrorKind::ReplayFailure,
        }
    }

    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            BackportError::Host { step, .. } => *step,
            BackportError::ReplayFailed { .. } => Step::Replay,
        }
    }
}

fn list_commits(commits: &[CommitSha]) -> String {
    let shas: Vec<&str> = commits.iter().map(CommitSha::as_str).collect();
    format!("[{}]", shas.join(", "))
}

/// Convenience result alias.
pub type BackportResult<T> = std::result::Result<T, BackportError>;
