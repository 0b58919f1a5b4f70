//! The backport orchestrator.
//!
//! [`Backporter`] replays the commits of a pull request onto another base
//! branch and opens a pull request for them. The operation is atomic with
//! respect to the working branch: once that branch is created, it either
//! ends up as the head of the new pull request or it is deleted before the
//! error is returned.

use std::sync::Arc;

use tracing::Instrument;

use crate::defaults::{resolve_parameters, ResolvedBackport};
use crate::diagnostics::{BackportEvent, DiagnosticSink, Diagnostics, TracingSink};
use crate::error::{BackportError, BackportResult, ErrorKind, Step};
use crate::hook::{BackportHook, NoopHook};
use crate::host::HostApi;
use crate::model::{BackportRequest, BranchName, CommitSha, NewPullRequest, PullRequestNumber, RepoId};
use crate::replay::CommitReplayer;

/// Progress once the working branch exists.
enum Stage {
    Replay,
    OpenPullRequest,
    /// Entered from any failure after branch creation.
    Compensate(BackportError),
    Done(PullRequestNumber),
}

/// Backports pull requests using injected collaborators.
///
/// Holds no per-invocation state; one instance can serve concurrent
/// backports as long as their working branches differ.
pub struct Backporter {
    host: Arc<dyn HostApi>,
    replayer: Arc<dyn CommitReplayer>,
    hook: Arc<dyn BackportHook>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Backporter {
    pub fn new(host: Arc<dyn HostApi>, replayer: Arc<dyn CommitReplayer>) -> Self {
        Self {
            host,
            replayer,
            hook: Arc::new(NoopHook),
            sink: Arc::new(TracingSink),
        }
    }

    /// Install a hook run between branch creation and replay. Tests only.
    pub fn with_hook(mut self, hook: Arc<dyn BackportHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Backport `request.pull_request` onto `request.base` and return the
    /// number of the new pull request.
    ///
    /// Not idempotent: a second call with the same parameters fails at
    /// branch creation because the first call's branch still exists.
    pub async fn backport(
        &self,
        repo: &RepoId,
        request: &BackportRequest,
    ) -> BackportResult<PullRequestNumber> {
        let diagnostics = Diagnostics::new(self.sink.as_ref());
        let span = tracing::info_span!(
            "backport.run",
            operation_id = %diagnostics.operation_id(),
            %repo,
            source = %request.pull_request,
            base = %request.base,
        );
        self.run(repo, request, &diagnostics).instrument(span).await
    }

    async fn run(
        &self,
        repo: &RepoId,
        request: &BackportRequest,
        diagnostics: &Diagnostics<'_>,
    ) -> BackportResult<PullRequestNumber> {
        let params = resolve_parameters(self.host.as_ref(), repo, request).await?;
        diagnostics.emit(BackportEvent::Started {
            repo: repo.to_string(),
            source: params.source,
            base: params.base.clone(),
            head: params.head.clone(),
            title: params.title.clone(),
            body: params.body.clone(),
        });

        let base_tip = self
            .host
            .resolve_tip(repo, &params.base)
            .await
            .map_err(|e| BackportError::host(Step::ResolveBase, &params.base, e))?;
        diagnostics.emit(BackportEvent::BaseResolved {
            base: params.base.clone(),
            sha: base_tip.clone(),
        });

        let commits = self
            .host
            .list_commits(repo, params.source)
            .await
            .map_err(|e| BackportError::host(Step::ListCommits, params.source, e))?;
        diagnostics.emit(BackportEvent::CommitsFetched {
            commits: commits.clone(),
        });

        self.host
            .create_ref(repo, &params.head, &base_tip)
            .await
            .map_err(|e| BackportError::host(Step::CreateBranch, &params.head, e))?;
        diagnostics.emit(BackportEvent::BranchCreated {
            head: params.head.clone(),
            sha: base_tip,
        });

        self.hook.on_branch_created(&params.head, &commits).await;

        // The working branch exists: every exit below goes through Done or
        // Compensate.
        let mut stage = Stage::Replay;
        loop {
            stage = match stage {
                Stage::Replay => self.replay(repo, &params, &commits, diagnostics).await,
                Stage::OpenPullRequest => self.open_pull_request(repo, &params, diagnostics).await,
                Stage::Compensate(primary) => {
                    self.compensate(repo, &params.head, primary.kind(), diagnostics)
                        .await;
                    return Err(primary);
                }
                Stage::Done(number) => return Ok(number),
            };
        }
    }

    async fn replay(
        &self,
        repo: &RepoId,
        params: &ResolvedBackport,
        commits: &[CommitSha],
        diagnostics: &Diagnostics<'_>,
    ) -> Stage {
        match self.replayer.replay(repo, commits, &params.head).await {
            Ok(tip) => {
                diagnostics.emit(BackportEvent::CommitsReplayed {
                    head: params.head.clone(),
                    sha: tip,
                });
                Stage::OpenPullRequest
            }
            Err(source) => {
                diagnostics.emit(BackportEvent::ReplayFailed {
                    head: params.head.clone(),
                    error: source.to_string(),
                });
                Stage::Compensate(BackportError::ReplayFailed {
                    commits: commits.to_vec(),
                    base: params.base.clone(),
                    source,
                })
            }
        }
    }

    async fn open_pull_request(
        &self,
        repo: &RepoId,
        params: &ResolvedBackport,
        diagnostics: &Diagnostics<'_>,
    ) -> Stage {
        let new_pull_request = NewPullRequest {
            title: params.title.clone(),
            head: params.head.clone(),
            base: params.base.clone(),
            body: params.body.clone(),
        };
        match self.host.create_pull_request(repo, &new_pull_request).await {
            Ok(number) => {
                diagnostics.emit(BackportEvent::PullRequestCreated { number });
                Stage::Done(number)
            }
            Err(e) => Stage::Compensate(BackportError::host(
                Step::CreatePullRequest,
                &params.head,
                e,
            )),
        }
    }

    /// Delete the working branch. A failure here is reported, never raised.
    async fn compensate(
        &self,
        repo: &RepoId,
        head: &BranchName,
        cause: ErrorKind,
        diagnostics: &Diagnostics<'_>,
    ) {
        match self.host.delete_ref(repo, head).await {
            Ok(()) => diagnostics.emit(BackportEvent::RolledBack {
                head: head.clone(),
                cause,
            }),
            Err(e) => diagnostics.emit(BackportEvent::RollbackFailed {
                head: head.clone(),
                cause,
                kind: ErrorKind::CompensationFailure,
                error: BackportError::host(Step::DeleteBranch, head, e).to_string(),
            }),
        }
    }
}

/// One-shot backport with the default hook and sink.
pub async fn backport_pull_request(
    host: Arc<dyn HostApi>,
    replayer: Arc<dyn CommitReplayer>,
    repo: &RepoId,
    request: &BackportRequest,
) -> BackportResult<PullRequestNumber> {
    Backporter::new(host, replayer).backport(repo, request).await
}
