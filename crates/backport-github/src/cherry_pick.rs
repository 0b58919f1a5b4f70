//! Server-side cherry-pick over the Git Data API.
//!
//! GitHub has no cherry-pick endpoint. Each commit is replayed with the
//! sibling-commit technique:
//!
//! 1. create a commit with the current tip's tree whose parent is the picked
//!    commit's parent, and point the working branch at it;
//! 2. merge the picked commit into the branch, so the merged tree holds the
//!    picked change on top of the current tip;
//! 3. create the final commit from that tree with the tip as its only parent
//!    and the picked commit's message and author, then move the branch there.
//!
//! If any step fails the branch is reset to where it started.

use std::sync::Arc;

use async_trait::async_trait;
use backport_core::{
    BranchName, CommitReplayer, CommitSha, HostError, HostResult, RepoId, ReplayError,
};
use tracing::{debug, warn};

use crate::api::{GitCommit, NewGitCommit};
use crate::client::GithubClient;

/// The Git Data calls the cherry-pick is built from.
#[async_trait]
pub(crate) trait GitData: Send + Sync {
    async fn branch_tip(&self, repo: &RepoId, branch: &BranchName) -> HostResult<CommitSha>;

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> HostResult<GitCommit>;

    async fn create_commit(
        &self,
        repo: &RepoId,
        commit: &NewGitCommit<'_>,
    ) -> HostResult<GitCommit>;

    /// Move `branch` to `sha`, allowing non-fast-forward moves when `force`.
    async fn update_ref(
        &self,
        repo: &RepoId,
        branch: &BranchName,
        sha: &str,
        force: bool,
    ) -> HostResult<()>;

    /// Merge `head` into `base` on the server.
    ///
    /// Returns the merged tree, or `None` when there was nothing to merge.
    /// A merge conflict is reported as [`HostError::Conflict`].
    async fn merge(
        &self,
        repo: &RepoId,
        base: &BranchName,
        head: &str,
        commit_message: &str,
    ) -> HostResult<Option<String>>;
}

/// [`CommitReplayer`] backed by [`GithubClient`].
pub struct GithubCherryPicker {
    git: Arc<dyn GitData>,
}

impl GithubCherryPicker {
    pub fn new(client: Arc<GithubClient>) -> Self {
        Self { git: client }
    }

    #[cfg(test)]
    pub(crate) fn with_git_data(git: Arc<dyn GitData>) -> Self {
        Self { git }
    }

    /// Pick one commit on top of `tip`, returning the new tip.
    async fn pick(
        &self,
        repo: &RepoId,
        head: &BranchName,
        tip: &CommitSha,
        commit: &CommitSha,
    ) -> Result<CommitSha, ReplayError> {
        let picked = self.git.get_commit(repo, commit.as_str()).await?;
        let parents: Vec<&str> = picked.parent_shas().collect();
        let parent = match parents.as_slice() {
            [parent] => *parent,
            [] => return Err(conflict(commit, "root commits cannot be cherry-picked")),
            _ => return Err(conflict(commit, "merge commits cannot be cherry-picked")),
        };

        let current = self.git.get_commit(repo, tip.as_str()).await?;
        let sibling_message = format!("sibling of {}", commit.as_str());
        let sibling = self
            .git
            .create_commit(
                repo,
                &NewGitCommit {
                    message: &sibling_message,
                    tree: current.tree_sha(),
                    parents: vec![parent],
                    author: None,
                },
            )
            .await?;
        self.git.update_ref(repo, head, &sibling.sha, true).await?;

        let merge_message = format!("merge {} into {}", commit.as_str(), head);
        let tree = match self
            .git
            .merge(repo, head, commit.as_str(), &merge_message)
            .await
        {
            Ok(Some(tree)) => tree,
            Ok(None) => current.tree_sha().to_string(),
            Err(HostError::Conflict(detail)) => return Err(conflict(commit, detail)),
            Err(err) => return Err(err.into()),
        };

        let replayed = self
            .git
            .create_commit(
                repo,
                &NewGitCommit {
                    message: &picked.message,
                    tree: &tree,
                    parents: vec![tip.as_str()],
                    author: picked.author.as_ref(),
                },
            )
            .await?;
        self.git.update_ref(repo, head, &replayed.sha, true).await?;

        debug!(%repo, %head, commit = commit.short(), replayed = %replayed.sha, "cherry-picked commit");
        Ok(CommitSha::new(replayed.sha))
    }
}

fn conflict(commit: &CommitSha, detail: impl Into<String>) -> ReplayError {
    ReplayError::Conflict {
        commit: commit.clone(),
        detail: detail.into(),
    }
}

#[async_trait]
impl CommitReplayer for GithubCherryPicker {
    async fn replay(
        &self,
        repo: &RepoId,
        commits: &[CommitSha],
        head: &BranchName,
    ) -> Result<CommitSha, ReplayError> {
        let start = self.git.branch_tip(repo, head).await?;
        let mut tip = start.clone();
        for commit in commits {
            match self.pick(repo, head, &tip, commit).await {
                Ok(next) => tip = next,
                Err(err) => {
                    if let Err(reset) = self
                        .git
                        .update_ref(repo, head, start.as_str(), true)
                        .await
                    {
                        warn!(%repo, %head, error = %reset, "failed to reset branch after cherry-pick failure");
                    }
                    return Err(err);
                }
            }
        }
        Ok(tip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GitActor, ShaRef};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// What the next `merge` call answers.
    #[derive(Clone)]
    enum MergeOutcome {
        Tree(&'static str),
        UpToDate,
        Conflict,
    }

    #[derive(Default)]
    struct State {
        commits: HashMap<String, GitCommit>,
        refs: HashMap<String, String>,
        ref_updates: Vec<(String, String, bool)>,
        merges: Vec<String>,
        next_id: u32,
    }

    /// In-memory Git Data store with scripted merge results.
    struct MemoryGit {
        state: Mutex<State>,
        merge_outcome: MergeOutcome,
    }

    impl MemoryGit {
        fn new(merge_outcome: MergeOutcome) -> Self {
            Self {
                state: Mutex::new(State::default()),
                merge_outcome,
            }
        }

        fn seed(&self, sha: &str, tree: &str, parents: &[&str], message: &str) {
            let commit = GitCommit {
                sha: sha.to_string(),
                message: message.to_string(),
                tree: ShaRef {
                    sha: tree.to_string(),
                },
                parents: parents
                    .iter()
                    .map(|p| ShaRef { sha: p.to_string() })
                    .collect(),
                author: Some(GitActor {
                    name: "Dev".to_string(),
                    email: "dev@example.com".to_string(),
                    date: Some("2024-05-01T10:00:00Z".to_string()),
                }),
            };
            self.state
                .lock()
                .unwrap()
                .commits
                .insert(sha.to_string(), commit);
        }

        fn set_ref(&self, branch: &str, sha: &str) {
            self.state
                .lock()
                .unwrap()
                .refs
                .insert(branch.to_string(), sha.to_string());
        }

        fn ref_sha(&self, branch: &str) -> Option<String> {
            self.state.lock().unwrap().refs.get(branch).cloned()
        }

        fn commit(&self, sha: &str) -> GitCommit {
            self.state.lock().unwrap().commits[sha].clone()
        }

        fn ref_updates(&self) -> Vec<(String, String, bool)> {
            self.state.lock().unwrap().ref_updates.clone()
        }

        fn merges(&self) -> Vec<String> {
            self.state.lock().unwrap().merges.clone()
        }
    }

    #[async_trait]
    impl GitData for MemoryGit {
        async fn branch_tip(&self, _repo: &RepoId, branch: &BranchName) -> HostResult<CommitSha> {
            self.ref_sha(branch.as_str())
                .map(CommitSha::new)
                .ok_or_else(|| HostError::NotFound(branch.qualified()))
        }

        async fn get_commit(&self, _repo: &RepoId, sha: &str) -> HostResult<GitCommit> {
            self.state
                .lock()
                .unwrap()
                .commits
                .get(sha)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("commit {sha}")))
        }

        async fn create_commit(
            &self,
            _repo: &RepoId,
            commit: &NewGitCommit<'_>,
        ) -> HostResult<GitCommit> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let created = GitCommit {
                sha: format!("new{}", state.next_id),
                message: commit.message.to_string(),
                tree: ShaRef {
                    sha: commit.tree.to_string(),
                },
                parents: commit
                    .parents
                    .iter()
                    .map(|p| ShaRef { sha: p.to_string() })
                    .collect(),
                author: commit.author.cloned(),
            };
            state.commits.insert(created.sha.clone(), created.clone());
            Ok(created)
        }

        async fn update_ref(
            &self,
            _repo: &RepoId,
            branch: &BranchName,
            sha: &str,
            force: bool,
        ) -> HostResult<()> {
            let mut state = self.state.lock().unwrap();
            state
                .ref_updates
                .push((branch.to_string(), sha.to_string(), force));
            state.refs.insert(branch.to_string(), sha.to_string());
            Ok(())
        }

        async fn merge(
            &self,
            _repo: &RepoId,
            _base: &BranchName,
            head: &str,
            _commit_message: &str,
        ) -> HostResult<Option<String>> {
            self.state.lock().unwrap().merges.push(head.to_string());
            match self.merge_outcome.clone() {
                MergeOutcome::Tree(tree) => Ok(Some(tree.to_string())),
                MergeOutcome::UpToDate => Ok(None),
                MergeOutcome::Conflict => Err(HostError::Conflict(
                    "merge 409 Conflict: Merge conflict".to_string(),
                )),
            }
        }
    }

    /// `base` (tree-base) is the working branch tip; `pick` (tree-pick)
    /// sits on `parent`, which the working branch does not contain.
    fn seeded(outcome: MergeOutcome) -> (Arc<MemoryGit>, RepoId, BranchName) {
        let git = Arc::new(MemoryGit::new(outcome));
        git.seed("parent", "tree-parent", &["root"], "parent");
        git.seed("pick", "tree-pick", &["parent"], "Fix the widget");
        git.seed("base", "tree-base", &["root"], "base");
        git.set_ref("backport-4-to-main", "base");
        (git, RepoId::new("o", "r"), BranchName::new("backport-4-to-main"))
    }

    #[tokio::test]
    async fn test_clean_pick_creates_commit_on_top_of_tip() {
        let (git, repo, head) = seeded(MergeOutcome::Tree("tree-merged"));
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let tip = picker
            .replay(&repo, &[CommitSha::new("pick")], &head)
            .await
            .unwrap();

        let replayed = git.commit(tip.as_str());
        assert_eq!(replayed.message, "Fix the widget");
        assert_eq!(replayed.tree_sha(), "tree-merged");
        assert_eq!(replayed.parent_shas().collect::<Vec<_>>(), vec!["base"]);
        assert_eq!(replayed.author.as_ref().unwrap().name, "Dev");
        assert_eq!(git.ref_sha(head.as_str()), Some(tip.as_str().to_string()));

        // First move is to the sibling: tip tree, picked commit's parent.
        let updates = git.ref_updates();
        assert_eq!(updates.len(), 2);
        let sibling = git.commit(&updates[0].1);
        assert_eq!(sibling.tree_sha(), "tree-base");
        assert_eq!(sibling.parent_shas().collect::<Vec<_>>(), vec!["parent"]);
        assert!(updates.iter().all(|(_, _, force)| *force));
        assert_eq!(git.merges(), vec!["pick"]);
    }

    #[tokio::test]
    async fn test_commits_are_picked_in_order() {
        let (git, repo, head) = seeded(MergeOutcome::Tree("tree-merged"));
        git.seed("pick2", "tree-pick2", &["pick"], "Follow-up");
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let tip = picker
            .replay(
                &repo,
                &[CommitSha::new("pick"), CommitSha::new("pick2")],
                &head,
            )
            .await
            .unwrap();

        assert_eq!(git.merges(), vec!["pick", "pick2"]);
        let last = git.commit(tip.as_str());
        assert_eq!(last.message, "Follow-up");
        let first = git.commit(last.parent_shas().next().unwrap());
        assert_eq!(first.message, "Fix the widget");
        assert_eq!(first.parent_shas().collect::<Vec<_>>(), vec!["base"]);
    }

    #[tokio::test]
    async fn test_up_to_date_merge_keeps_tip_tree() {
        let (git, repo, head) = seeded(MergeOutcome::UpToDate);
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let tip = picker
            .replay(&repo, &[CommitSha::new("pick")], &head)
            .await
            .unwrap();

        assert_eq!(git.commit(tip.as_str()).tree_sha(), "tree-base");
    }

    #[tokio::test]
    async fn test_merge_conflict_resets_branch_to_starting_tip() {
        let (git, repo, head) = seeded(MergeOutcome::Conflict);
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let err = picker
            .replay(&repo, &[CommitSha::new("pick")], &head)
            .await
            .unwrap_err();

        match err {
            ReplayError::Conflict { commit, detail } => {
                assert_eq!(commit.as_str(), "pick");
                assert!(detail.contains("Merge conflict"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        let updates = git.ref_updates();
        assert_eq!(
            updates.last(),
            Some(&(head.to_string(), "base".to_string(), true))
        );
        assert_eq!(git.ref_sha(head.as_str()).as_deref(), Some("base"));
    }

    #[tokio::test]
    async fn test_merge_commit_is_rejected_without_writes() {
        let (git, repo, head) = seeded(MergeOutcome::Tree("tree-merged"));
        git.seed("merge", "tree-m", &["parent", "base"], "Merge branch 'x'");
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let err = picker
            .replay(&repo, &[CommitSha::new("merge")], &head)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplayError::Conflict { ref detail, .. } if detail.contains("merge commits")
        ));
        assert!(git.merges().is_empty());
        // Only the reset touched the branch.
        assert_eq!(
            git.ref_updates(),
            vec![(head.to_string(), "base".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_root_commit_is_rejected() {
        let (git, repo, head) = seeded(MergeOutcome::Tree("tree-merged"));
        git.seed("root", "tree-root", &[], "Initial commit");
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let err = picker
            .replay(&repo, &[CommitSha::new("root")], &head)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReplayError::Conflict { ref detail, .. } if detail.contains("root commits")
        ));
    }

    #[tokio::test]
    async fn test_later_failure_rewinds_earlier_picks() {
        let (git, repo, head) = seeded(MergeOutcome::Tree("tree-merged"));
        let picker = GithubCherryPicker::with_git_data(git.clone());

        let err = picker
            .replay(
                &repo,
                &[CommitSha::new("pick"), CommitSha::new("missing")],
                &head,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReplayError::Host(HostError::NotFound(_))));
        assert_eq!(git.ref_sha(head.as_str()).as_deref(), Some("base"));
    }
}
