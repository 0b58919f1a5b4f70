//! GitHub REST client implementing [`HostApi`].

use async_trait::async_trait;
use backport_core::{
    BranchName, CommitSha, HostApi, HostError, HostResult, NewPullRequest, PullRequest,
    PullRequestNumber, RepoId,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    ApiErrorBody, CreateRefBody, CreatedPullRequest, GitCommit, MergeBody, MergeResponse,
    NewGitCommit, PullRequestResponse, RefResponse, ShaRef, UpdateRefBody,
};
use crate::cherry_pick::GitData;
use crate::config::GithubConfig;
use crate::error::{classify_status, transport, GithubError};

const API_VERSION: &str = "2022-11-28";

/// GitHub caps `per_page` at 100.
const PAGE_SIZE: usize = 100;

/// GitHub REST client
pub struct GithubClient {
    config: GithubConfig,
    base: Url,
    http: reqwest::Client,
}

impl GithubClient {
    /// Create a client. Fails without a token: every backport writes.
    pub fn new(config: GithubConfig) -> Result<Self, GithubError> {
        let base = parse_api_root(config.api_root())?;
        let token = config.token.as_deref().ok_or(GithubError::MissingToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| GithubError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(GithubClient { config, base, http })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self, GithubError> {
        Self::new(GithubConfig::from_env())
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn repo_url<'a>(&self, repo: &RepoId, segments: impl IntoIterator<Item = &'a str>) -> Url {
        repo_url(&self.base, repo, segments)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> HostResult<Response> {
        let response = request.send().await.map_err(|e| transport(what, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        Err(classify_status(status, what, &body.message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> HostResult<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| transport(what, e))
    }

    async fn fetch_pull_request(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<PullRequestResponse> {
        let n = number.get().to_string();
        let url = self.repo_url(repo, ["pulls", n.as_str()]);
        self.send_json(self.http.get(url), &format!("pull request {number}"))
            .await
    }
}

fn parse_api_root(root: &str) -> Result<Url, GithubError> {
    let url = Url::parse(root).map_err(|_| GithubError::InvalidApiUrl(root.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(GithubError::InvalidApiUrl(root.to_string()));
    }
    Ok(url)
}

/// `{api}/repos/{owner}/{name}/{segments..}`, each segment percent-encoded.
pub(crate) fn repo_url<'a>(
    base: &Url,
    repo: &RepoId,
    segments: impl IntoIterator<Item = &'a str>,
) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
            .extend(segments);
    }
    url
}

/// `git/{kind}/heads/<branch>`. Slashes in the branch stay separators.
fn ref_segments<'a>(kind: &'a str, branch: &'a BranchName) -> impl Iterator<Item = &'a str> {
    ["git", kind, "heads"]
        .into_iter()
        .chain(branch.as_str().split('/'))
}

/// Treat GitHub's 422 "Reference does not exist" on delete as `NotFound`.
fn missing_ref_on_delete(err: HostError) -> HostError {
    match err {
        HostError::Conflict(detail) => HostError::NotFound(detail),
        other => other,
    }
}

/// `pulls/{n}/commits` stops at 250 entries; refuse to replay a partial list.
fn check_listed(number: PullRequestNumber, listed: usize, total: Option<u64>) -> HostResult<()> {
    match total {
        Some(total) if total != listed as u64 => Err(HostError::Transport(format!(
            "pull request {number} has {total} commits but only {listed} could be listed"
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl HostApi for GithubClient {
    async fn resolve_tip(&self, repo: &RepoId, branch: &BranchName) -> HostResult<CommitSha> {
        let url = self.repo_url(repo, ref_segments("ref", branch));
        let reference: RefResponse = self
            .send_json(self.http.get(url), &format!("ref {}", branch.qualified()))
            .await?;
        Ok(CommitSha::new(reference.object.sha))
    }

    async fn list_commits(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<Vec<CommitSha>> {
        let total = self.fetch_pull_request(repo, number).await?.commits;
        let n = number.get().to_string();

        let mut commits = Vec::new();
        let mut page = 1usize;
        loop {
            let url = self.repo_url(repo, ["pulls", n.as_str(), "commits"]);
            let request = self
                .http
                .get(url)
                .query(&[("per_page", PAGE_SIZE), ("page", page)]);
            let batch: Vec<ShaRef> = self
                .send_json(request, &format!("pull request {number} commits"))
                .await?;
            let done = batch.len() < PAGE_SIZE;
            commits.extend(batch.into_iter().map(|c| CommitSha::new(c.sha)));
            if done {
                break;
            }
            page += 1;
        }
        check_listed(number, commits.len(), total)?;
        debug!(%repo, %number, count = commits.len(), "listed pull request commits");
        Ok(commits)
    }

    async fn create_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        sha: &CommitSha,
    ) -> HostResult<()> {
        let url = self.repo_url(repo, ["git", "refs"]);
        let body = CreateRefBody {
            reference: branch.qualified(),
            sha: sha.as_str(),
        };
        self.send(
            self.http.post(url).json(&body),
            &format!("create ref {}", branch.qualified()),
        )
        .await?;
        Ok(())
    }

    async fn delete_ref(&self, repo: &RepoId, branch: &BranchName) -> HostResult<()> {
        let url = self.repo_url(repo, ref_segments("refs", branch));
        self.send(
            self.http.delete(url),
            &format!("delete ref {}", branch.qualified()),
        )
        .await
        .map_err(missing_ref_on_delete)?;
        Ok(())
    }

    async fn get_pull_request(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<PullRequest> {
        let pr = self.fetch_pull_request(repo, number).await?;
        Ok(PullRequest {
            number: PullRequestNumber(pr.number),
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            base: BranchName::new(pr.base.name),
            head: BranchName::new(pr.head.name),
        })
    }

    async fn create_pull_request(
        &self,
        repo: &RepoId,
        pull_request: &NewPullRequest,
    ) -> HostResult<PullRequestNumber> {
        let url = self.repo_url(repo, ["pulls"]);
        let created: CreatedPullRequest = self
            .send_json(
                self.http.post(url).json(pull_request),
                &format!(
                    "create pull request {} -> {}",
                    pull_request.head, pull_request.base
                ),
            )
            .await?;
        Ok(PullRequestNumber(created.number))
    }
}

// Git Data API, used by the cherry-picker.
#[async_trait]
impl GitData for GithubClient {
    async fn branch_tip(&self, repo: &RepoId, branch: &BranchName) -> HostResult<CommitSha> {
        self.resolve_tip(repo, branch).await
    }

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> HostResult<GitCommit> {
        let url = self.repo_url(repo, ["git", "commits", sha]);
        self.send_json(self.http.get(url), &format!("commit {sha}"))
            .await
    }

    async fn create_commit(
        &self,
        repo: &RepoId,
        commit: &NewGitCommit<'_>,
    ) -> HostResult<GitCommit> {
        let url = self.repo_url(repo, ["git", "commits"]);
        self.send_json(self.http.post(url).json(commit), "create commit")
            .await
    }

    async fn update_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        sha: &str,
        force: bool,
    ) -> HostResult<()> {
        let url = self.repo_url(repo, ref_segments("refs", branch));
        let body = UpdateRefBody { sha, force };
        self.send(
            self.http.patch(url).json(&body),
            &format!("update ref {}", branch.qualified()),
        )
        .await?;
        Ok(())
    }

    async fn merge(
        &self,
        repo: &RepoId,
        base: &BranchName,
        head: &str,
        commit_message: &str,
    ) -> HostResult<Option<String>> {
        let url = self.repo_url(repo, ["merges"]);
        let body = MergeBody {
            base: base.as_str(),
            head,
            commit_message,
        };
        let what = format!("merge {head} into {base}");
        let response = self.send(self.http.post(url).json(&body), &what).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let merged: MergeResponse = response.json().await.map_err(|e| transport(&what, e))?;
        Ok(Some(merged.commit.tree.sha))
    }
}
