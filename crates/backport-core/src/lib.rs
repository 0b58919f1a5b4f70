//! Backport Core Library
//!
//! Replays the commits of a pull request onto another branch and opens a
//! new pull request for them, leaving no working branch behind on failure.
//!
//! The host and the cherry-pick primitive are injected through
//! [`HostApi`] and [`CommitReplayer`]; [`Backporter`] sequences them.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use backport_core::{Backporter, BackportRequest};
//!
//! let backporter = Backporter::new(host, replayer);
//! let number = backporter
//!     .backport(&repo, &BackportRequest::new(42, "release/1.0"))
//!     .await?;
//! ```

pub mod defaults;
pub mod diagnostics;
pub mod error;
#[cfg(feature = "fakes")]
pub mod fakes;
pub mod hook;
pub mod host;
pub mod model;
pub mod orchestrator;
pub mod replay;
pub mod telemetry;

pub use defaults::{default_body, default_head, default_title, resolve_parameters, ResolvedBackport};
pub use diagnostics::{
    BackportEvent, DiagnosticRecord, DiagnosticSink, FanoutSink, RecordingSink, TracingSink,
};
pub use error::{
    BackportError, BackportResult, ErrorKind, HostError, HostResult, ReplayError, Step,
};
pub use hook::{BackportHook, NoopHook};
pub use host::HostApi;
pub use model::{
    BackportRequest, BranchName, CommitSha, NewPullRequest, ParseRepoIdError, PullRequest,
    PullRequestNumber, RepoId,
};
pub use orchestrator::{backport_pull_request, Backporter};
pub use replay::CommitReplayer;
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
