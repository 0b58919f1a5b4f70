//! In-memory fakes for the collaborator traits (testing only)
//!
//! [`MemoryHost`] models a single repository: content-addressed commits
//! whose content is a list of lines, named branches and pull requests. It
//! implements both [`HostApi`] and [`CommitReplayer`], records every call,
//! and can be told to fail specific operations.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{HostError, HostResult, ReplayError};
use crate::host::HostApi;
use crate::model::{BranchName, CommitSha, NewPullRequest, PullRequest, PullRequestNumber, RepoId};
use crate::replay::CommitReplayer;

/// Operations of [`MemoryHost`], used for call inspection and failure
/// injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    ResolveTip,
    ListCommits,
    CreateRef,
    DeleteRef,
    GetPullRequest,
    CreatePullRequest,
    Replay,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub op: HostOp,
    pub target: String,
}

/// A stored commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitObject {
    pub sha: CommitSha,
    pub parent: Option<CommitSha>,
    pub message: String,
    pub lines: Vec<String>,
}

#[derive(Debug)]
struct StoredPullRequest {
    pull_request: PullRequest,
    commits: Vec<CommitSha>,
}

#[derive(Debug, Default)]
struct State {
    commits: HashMap<CommitSha, CommitObject>,
    refs: BTreeMap<BranchName, CommitSha>,
    pulls: BTreeMap<u64, StoredPullRequest>,
    next_number: u64,
    calls: Vec<HostCall>,
    failures: HashMap<HostOp, HostError>,
}

impl State {
    fn call(&mut self, op: HostOp, target: impl ToString) -> HostResult<()> {
        self.calls.push(HostCall {
            op,
            target: target.to_string(),
        });
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn tip(&self, branch: &BranchName) -> HostResult<CommitSha> {
        self.refs
            .get(branch)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("branch {branch}")))
    }

    fn lines_of(&self, sha: Option<&CommitSha>) -> HostResult<Vec<String>> {
        match sha {
            None => Ok(Vec::new()),
            Some(sha) => self
                .commits
                .get(sha)
                .map(|c| c.lines.clone())
                .ok_or_else(|| HostError::NotFound(format!("commit {sha}"))),
        }
    }

    /// First-parent history of `sha`, newest first.
    fn history(&self, sha: &CommitSha) -> Vec<CommitObject> {
        let mut out = Vec::new();
        let mut cursor = self.commits.get(sha);
        while let Some(commit) = cursor {
            out.push(commit.clone());
            cursor = commit.parent.as_ref().and_then(|p| self.commits.get(p));
        }
        out
    }

    /// Commits reachable from `head` but not from `base`, oldest first.
    fn divergent(&self, base: &BranchName, head: &BranchName) -> Vec<CommitSha> {
        let (Some(base_tip), Some(head_tip)) = (self.refs.get(base), self.refs.get(head)) else {
            return Vec::new();
        };
        let on_base: HashSet<CommitSha> = self.history(base_tip).into_iter().map(|c| c.sha).collect();
        let mut commits: Vec<CommitSha> = self
            .history(head_tip)
            .into_iter()
            .map(|c| c.sha)
            .take_while(|sha| !on_base.contains(sha))
            .collect();
        commits.reverse();
        commits
    }

    fn insert_commit(
        &mut self,
        parent: Option<&CommitSha>,
        message: &str,
        lines: Vec<String>,
    ) -> CommitSha {
        let sha = commit_sha(parent, message, &lines);
        self.commits.entry(sha.clone()).or_insert_with(|| CommitObject {
            sha: sha.clone(),
            parent: parent.cloned(),
            message: message.to_string(),
            lines,
        });
        sha
    }
}

fn commit_sha(parent: Option<&CommitSha>, message: &str, lines: &[String]) -> CommitSha {
    let mut hasher = Sha256::new();
    hasher.update(b"parent ");
    hasher.update(parent.map(CommitSha::as_str).unwrap_or("").as_bytes());
    hasher.update(b"\nmessage ");
    hasher.update(message.as_bytes());
    for line in lines {
        hasher.update(b"\n");
        hasher.update(line.as_bytes());
    }
    let hex = hex::encode(hasher.finalize());
    CommitSha::new(&hex[..40])
}

/// Line-wise three-way apply of the change `parent -> picked` onto `tip`.
fn apply_change(tip: &[String], parent: &[String], picked: &[String]) -> Result<Vec<String>, String> {
    if tip == parent {
        return Ok(picked.to_vec());
    }
    if tip.len() != parent.len() || picked.len() != parent.len() {
        return Err("line count differs between base and commit".to_string());
    }
    let mut merged = tip.to_vec();
    for (i, (before, after)) in parent.iter().zip(picked).enumerate() {
        if before == after {
            continue;
        }
        if tip[i] == *before || tip[i] == *after {
            merged[i] = after.clone();
        } else {
            return Err(format!("line {} changed on both sides", i + 1));
        }
    }
    Ok(merged)
}

/// In-memory repository host.
#[derive(Debug)]
pub struct MemoryHost {
    repo: RepoId,
    state: Mutex<State>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::for_repo(RepoId::new("stevedores-org", "backport-fixture"))
    }

    pub fn for_repo(repo: RepoId) -> Self {
        Self {
            repo,
            state: Mutex::new(State {
                next_number: 1,
                ..State::default()
            }),
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    // -- seeding ------------------------------------------------------------

    /// Store a commit and return its sha. Does not move any branch.
    pub fn commit(&self, parent: Option<&CommitSha>, message: &str, lines: &[&str]) -> CommitSha {
        let lines = lines.iter().map(|l| l.to_string()).collect();
        self.state.lock().unwrap().insert_commit(parent, message, lines)
    }

    /// Create or move a branch.
    pub fn set_ref(&self, branch: impl Into<BranchName>, sha: &CommitSha) {
        self.state
            .lock()
            .unwrap()
            .refs
            .insert(branch.into(), sha.clone());
    }

    /// Open a pull request directly, bypassing call recording. Its commit
    /// list is captured now: commits on `head` not on `base`.
    pub fn open_pull_request(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> PullRequestNumber {
        let mut state = self.state.lock().unwrap();
        let base = BranchName::new(base);
        let head = BranchName::new(head);
        let commits = state.divergent(&base, &head);
        let number = PullRequestNumber(state.next_number);
        state.next_number += 1;
        state.pulls.insert(
            number.get(),
            StoredPullRequest {
                pull_request: PullRequest {
                    number,
                    title: title.to_string(),
                    body: body.to_string(),
                    base,
                    head,
                },
                commits,
            },
        );
        number
    }

    /// Make every subsequent `op` fail with `error`.
    pub fn fail_on(&self, op: HostOp, error: HostError) {
        self.state.lock().unwrap().failures.insert(op, error);
    }

    pub fn clear_failure(&self, op: HostOp) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    // -- inspection ---------------------------------------------------------

    pub fn tip(&self, branch: &str) -> Option<CommitSha> {
        self.state
            .lock()
            .unwrap()
            .refs
            .get(&BranchName::new(branch))
            .cloned()
    }

    pub fn has_ref(&self, branch: &str) -> bool {
        self.tip(branch).is_some()
    }

    /// First-parent history of `branch`, oldest first.
    pub fn ref_commits(&self, branch: &str) -> Vec<CommitObject> {
        let state = self.state.lock().unwrap();
        let mut history = match state.refs.get(&BranchName::new(branch)) {
            Some(tip) => state.history(tip),
            None => Vec::new(),
        };
        history.reverse();
        history
    }

    pub fn pull_request(&self, number: PullRequestNumber) -> Option<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .get(&number.get())
            .map(|p| p.pull_request.clone())
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .values()
            .map(|p| p.pull_request.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, op: HostOp) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    fn check_repo(&self, repo: &RepoId) -> HostResult<()> {
        if *repo == self.repo {
            Ok(())
        } else {
            Err(HostError::NotFound(format!("repository {repo}")))
        }
    }

    fn replay_sync(
        &self,
        repo: &RepoId,
        commits: &[CommitSha],
        head: &BranchName,
    ) -> Result<CommitSha, ReplayError> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::Replay, head)?;
        self.check_repo(repo)?;

        let mut tip = state.tip(head)?;
        let mut tip_lines = state.lines_of(Some(&tip))?;
        let mut picked = Vec::with_capacity(commits.len());

        for sha in commits {
            let commit = state
                .commits
                .get(sha)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("commit {sha}")))?;
            let parent_lines = state.lines_of(commit.parent.as_ref())?;
            let merged = apply_change(&tip_lines, &parent_lines, &commit.lines).map_err(
                |detail| ReplayError::Conflict {
                    commit: sha.clone(),
                    detail,
                },
            )?;
            let next = commit_sha(Some(&tip), &commit.message, &merged);
            picked.push((tip, commit.message, merged.clone()));
            tip = next;
            tip_lines = merged;
        }

        // Nothing is written until every commit applied.
        for (parent, message, lines) in picked {
            state.insert_commit(Some(&parent), &message, lines);
        }
        state.refs.insert(head.clone(), tip.clone());
        Ok(tip)
    }
}

#[async_trait]
impl HostApi for MemoryHost {
    async fn resolve_tip(&self, repo: &RepoId, branch: &BranchName) -> HostResult<CommitSha> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::ResolveTip, branch)?;
        self.check_repo(repo)?;
        state.tip(branch)
    }

    async fn list_commits(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<Vec<CommitSha>> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::ListCommits, number)?;
        self.check_repo(repo)?;
        state
            .pulls
            .get(&number.get())
            .map(|p| p.commits.clone())
            .ok_or_else(|| HostError::NotFound(format!("pull request {number}")))
    }

    async fn create_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        sha: &CommitSha,
    ) -> HostResult<()> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::CreateRef, branch)?;
        self.check_repo(repo)?;
        if state.refs.contains_key(branch) {
            return Err(HostError::Conflict(format!(
                "reference {} already exists",
                branch.qualified()
            )));
        }
        if !state.commits.contains_key(sha) {
            return Err(HostError::NotFound(format!("commit {sha}")));
        }
        state.refs.insert(branch.clone(), sha.clone());
        Ok(())
    }

    async fn delete_ref(&self, repo: &RepoId, branch: &BranchName) -> HostResult<()> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::DeleteRef, branch)?;
        self.check_repo(repo)?;
        state
            .refs
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| HostError::NotFound(format!("branch {branch}")))
    }

    async fn get_pull_request(
        &self,
        repo: &RepoId,
        number: PullRequestNumber,
    ) -> HostResult<PullRequest> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::GetPullRequest, number)?;
        self.check_repo(repo)?;
        state
            .pulls
            .get(&number.get())
            .map(|p| p.pull_request.clone())
            .ok_or_else(|| HostError::NotFound(format!("pull request {number}")))
    }

    async fn create_pull_request(
        &self,
        repo: &RepoId,
        pull_request: &NewPullRequest,
    ) -> HostResult<PullRequestNumber> {
        let mut state = self.state.lock().unwrap();
        state.call(HostOp::CreatePullRequest, &pull_request.head)?;
        self.check_repo(repo)?;
        state.tip(&pull_request.base)?;
        state.tip(&pull_request.head)?;

        let duplicate = state.pulls.values().any(|p| {
            p.pull_request.base == pull_request.base && p.pull_request.head == pull_request.head
        });
        if duplicate {
            return Err(HostError::Conflict(format!(
                "a pull request already exists for {}",
                pull_request.head
            )));
        }
        let commits = state.divergent(&pull_request.base, &pull_request.head);
        if commits.is_empty() {
            return Err(HostError::Conflict(format!(
                "no commits between {} and {}",
                pull_request.base, pull_request.head
            )));
        }

        let number = PullRequestNumber(state.next_number);
        state.next_number += 1;
        state.pulls.insert(
            number.get(),
            StoredPullRequest {
                pull_request: PullRequest {
                    number,
                    title: pull_request.title.clone(),
                    body: pull_request.body.clone(),
                    base: pull_request.base.clone(),
                    head: pull_request.head.clone(),
                },
                commits,
            },
        );
        Ok(number)
    }
}

#[async_trait]
impl CommitReplayer for MemoryHost {
    async fn replay(
        &self,
        repo: &RepoId,
        commits: &[CommitSha],
        head: &BranchName,
    ) -> Result<CommitSha, ReplayError> {
        self.replay_sync(repo, commits, head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_change_takes_non_overlapping_edits() {
        let merged = apply_change(
            &lines(&["x", "a", "a"]),
            &lines(&["y", "a", "a"]),
            &lines(&["y", "b", "a"]),
        )
        .unwrap();
        assert_eq!(merged, lines(&["x", "b", "a"]));
    }

    #[test]
    fn test_apply_change_rejects_overlapping_edits() {
        let err = apply_change(&lines(&["dev"]), &lines(&["initial"]), &lines(&["feature"]))
            .unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_commit_sha_is_content_addressed() {
        let host = MemoryHost::new();
        let a = host.commit(None, "m", &["x"]);
        let b = host.commit(None, "m", &["x"]);
        let c = host.commit(None, "m", &["y"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 40);
    }

    #[tokio::test]
    async fn test_create_ref_conflicts_when_branch_exists() {
        let host = MemoryHost::new();
        let repo = host.repo().clone();
        let root = host.commit(None, "initial", &["a"]);
        host.set_ref("main", &root);

        let err = host
            .create_ref(&repo, &BranchName::new("main"), &root)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_ref_is_not_found() {
        let host = MemoryHost::new();
        let repo = host.repo().clone();
        let err = host
            .delete_ref(&repo, &BranchName::new("gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_pull_request_captures_divergent_commits() {
        let host = MemoryHost::new();
        let repo = host.repo().clone();
        let root = host.commit(None, "initial", &["a", "a"]);
        let one = host.commit(Some(&root), "one", &["b", "a"]);
        let two = host.commit(Some(&one), "two", &["b", "c"]);
        host.set_ref("main", &root);
        host.set_ref("feature", &two);

        let number = host.open_pull_request("main", "feature", "Feature", "");
        let commits = host.list_commits(&repo, number).await.unwrap();
        assert_eq!(commits, vec![one, two]);
    }

    #[tokio::test]
    async fn test_replay_leaves_head_untouched_on_conflict() {
        let host = MemoryHost::new();
        let repo = host.repo().clone();
        let root = host.commit(None, "initial", &["initial"]);
        let dev = host.commit(Some(&root), "dev", &["dev"]);
        let feature = host.commit(Some(&root), "feature", &["feature"]);
        host.set_ref("target", &dev);

        let err = host
            .replay(&repo, &[feature.clone()], &BranchName::new("target"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::Conflict { ref commit, .. } if *commit == feature));
        assert_eq!(host.tip("target"), Some(dev));
    }

    #[tokio::test]
    async fn test_injected_failure_is_returned_and_recorded() {
        let host = MemoryHost::new();
        let repo = host.repo().clone();
        host.fail_on(HostOp::ResolveTip, HostError::Transport("rate limited".into()));

        let err = host
            .resolve_tip(&repo, &BranchName::new("main"))
            .await
            .unwrap_err();
        assert_eq!(err, HostError::Transport("rate limited".into()));
        assert_eq!(host.count_calls(HostOp::ResolveTip), 1);

        host.clear_failure(HostOp::ResolveTip);
        let err = host
            .resolve_tip(&repo, &BranchName::new("main"))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
    }
}
