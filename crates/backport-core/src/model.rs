//! Value objects shared by the orchestrator and its collaborators.
//!
//! Every entity here is transient: built for one backport invocation and
//! dropped when it returns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Repository coordinates on the host, written `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Error returned when a repository slug is not of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository `{0}`: expected `owner/name`")]
pub struct ParseRepoIdError(String);

impl FromStr for RepoId {
    type Err = ParseRepoIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepoId::new(owner, name))
            }
            _ => Err(ParseRepoIdError(s.to_string())),
        }
    }
}

/// Name of a branch, without the `refs/heads/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified reference, e.g. `refs/heads/release/1.0`.
    pub fn qualified(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content-addressed commit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(String);

impl CommitSha {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitSha {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Host-assigned pull request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestNumber(pub u64);

impl PullRequestNumber {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PullRequestNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// A pull request as read back from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: PullRequestNumber,
    pub title: String,
    pub body: String,
    pub base: BranchName,
    pub head: BranchName,
}

/// Payload for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: BranchName,
    pub base: BranchName,
    pub body: String,
}

/// Parameters of one backport invocation.
///
/// `head`, `title` and `body` are overrides; when absent the orchestrator
/// derives them (see [`crate::defaults`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackportRequest {
    pub pull_request: PullRequestNumber,
    pub base: BranchName,
    pub head: Option<BranchName>,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl BackportRequest {
    pub fn new(pull_request: u64, base: impl Into<BranchName>) -> Self {
        Self {
            pull_request: PullRequestNumber(pull_request),
            base: base.into(),
            head: None,
            title: None,
            body: None,
        }
    }

    pub fn with_head(mut self, head: impl Into<BranchName>) -> Self {
        self.head = Some(head.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_parses_owner_and_name() {
        let repo: RepoId = "stevedores-org/backport".parse().unwrap();
        assert_eq!(repo.owner, "stevedores-org");
        assert_eq!(repo.name, "backport");
        assert_eq!(repo.to_string(), "stevedores-org/backport");
    }

    #[test]
    fn test_repo_id_rejects_malformed_slugs() {
        for bad in ["", "backport", "/backport", "org/", "org/a/b"] {
            assert!(bad.parse::<RepoId>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_commit_sha_short_form() {
        let sha = CommitSha::new("0123456789abcdef");
        assert_eq!(sha.short(), "0123456");
        assert_eq!(CommitSha::new("abc").short(), "abc");
    }

    #[test]
    fn test_branch_qualified_ref() {
        assert_eq!(
            BranchName::new("release/1.0").qualified(),
            "refs/heads/release/1.0"
        );
    }

    #[test]
    fn test_pull_request_number_display() {
        assert_eq!(PullRequestNumber(42).to_string(), "#42");
    }

    #[test]
    fn test_request_builder_sets_overrides() {
        let req = BackportRequest::new(7, "release")
            .with_head("my-head")
            .with_title("t")
            .with_body("b");
        assert_eq!(req.head, Some(BranchName::new("my-head")));
        assert_eq!(req.title.as_deref(), Some("t"));
        assert_eq!(req.body.as_deref(), Some("b"));
    }
}
