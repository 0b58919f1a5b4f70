//! Request and response shapes of the GitHub REST endpoints we call.
//!
//! Only the fields we read are declared; serde ignores the rest.

use serde::{Deserialize, Serialize};

/// `GET /repos/{o}/{r}/git/ref/heads/{branch}`
#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: ShaRef,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ShaRef {
    pub sha: String,
}

/// `POST /repos/{o}/{r}/git/refs`
#[derive(Debug, Serialize)]
pub(crate) struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: &'a str,
}

/// `PATCH /repos/{o}/{r}/git/refs/heads/{branch}`
#[derive(Debug, Serialize)]
pub(crate) struct UpdateRefBody<'a> {
    pub sha: &'a str,
    pub force: bool,
}

/// `GET /repos/{o}/{r}/pulls/{n}`
#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestResponse {
    pub number: u64,
    pub title: String,
    /// `null` when the description is empty.
    pub body: Option<String>,
    /// Total commit count; `pulls/{n}/commits` lists at most 250 of them.
    #[serde(default)]
    pub commits: Option<u64>,
    pub base: BranchRef,
    pub head: BranchRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchRef {
    #[serde(rename = "ref")]
    pub name: String,
}

/// `POST /repos/{o}/{r}/pulls`
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedPullRequest {
    pub number: u64,
}

/// Author or committer of a git commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitActor {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// `GET /repos/{o}/{r}/git/commits/{sha}`
#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub sha: String,
    pub message: String,
    pub(crate) tree: ShaRef,
    pub(crate) parents: Vec<ShaRef>,
    #[serde(default)]
    pub author: Option<GitActor>,
}

impl GitCommit {
    pub fn tree_sha(&self) -> &str {
        &self.tree.sha
    }

    pub fn parent_shas(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(|p| p.sha.as_str())
    }
}

/// `POST /repos/{o}/{r}/git/commits`
#[derive(Debug, Serialize)]
pub(crate) struct NewGitCommit<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'a GitActor>,
}

/// `POST /repos/{o}/{r}/merges`
#[derive(Debug, Serialize)]
pub(crate) struct MergeBody<'a> {
    pub base: &'a str,
    pub head: &'a str,
    pub commit_message: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MergeResponse {
    pub commit: MergeCommitDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MergeCommitDetail {
    pub tree: ShaRef,
}

/// Error payload GitHub returns with 4xx responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}
