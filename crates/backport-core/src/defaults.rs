//! Default head, title and body derivation.
//!
//! Resolved once, up front, before any mutation. Only the title default
//! costs a host read (the source pull request's title), and only when no
//! title override was given.

use serde::{Deserialize, Serialize};

use crate::error::{BackportError, BackportResult, Step};
use crate::host::HostApi;
use crate::model::{BackportRequest, BranchName, PullRequestNumber, RepoId};

/// Body used when none is given: `Backport #<n>.`
pub fn default_body(source: PullRequestNumber) -> String {
    format!("Backport {source}.")
}

/// Working branch used when none is given: `backport-<n>-to-<base>`.
pub fn default_head(source: PullRequestNumber, base: &BranchName) -> BranchName {
    BranchName::new(format!("backport-{}-to-{}", source.get(), base))
}

/// Title used when none is given: `[Backport <base>] <original title>`.
pub fn default_title(base: &BranchName, original_title: &str) -> String {
    format!("[Backport {base}] {original_title}")
}

/// Fully resolved parameters of a backport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBackport {
    pub source: PullRequestNumber,
    pub base: BranchName,
    pub head: BranchName,
    pub title: String,
    pub body: String,
}

/// Apply defaults to `request`.
///
/// Fetches the source pull request only if `request.title` is `None`.
pub async fn resolve_parameters(
    host: &dyn HostApi,
    repo: &RepoId,
    request: &BackportRequest,
) -> BackportResult<ResolvedBackport> {
    let source = request.pull_request;
    let base = request.base.clone();

    let title = match &request.title {
        Some(title) => title.clone(),
        None => {
            let original = host
                .get_pull_request(repo, source)
                .await
                .map_err(|e| BackportError::host(Step::FetchPullRequest, source, e))?;
            default_title(&base, &original.title)
        }
    };

    let head = request
        .head
        .clone()
        .unwrap_or_else(|| default_head(source, &base));
    let body = request
        .body
        .clone()
        .unwrap_or_else(|| default_body(source));

    Ok(ResolvedBackport {
        source,
        base,
        head,
        title,
        body,
    })
}
