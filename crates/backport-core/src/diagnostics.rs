//! Per-invocation diagnostic events.
//!
//! Every backport gets its own operation id. Step transitions are delivered
//! to the [`DiagnosticSink`] handed to the orchestrator, tagged with that id,
//! so concurrent backports never interleave unattributed lines.
//!
//! [`TracingSink`] (the default) forwards records to `tracing`; use
//! `RUST_LOG=backport_core=debug` to see every transition.
//! [`RecordingSink`] keeps them in memory.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::model::{BranchName, CommitSha, PullRequestNumber};

/// A step transition of one backport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackportEvent {
    Started {
        repo: String,
        source: PullRequestNumber,
        base: BranchName,
        head: BranchName,
        title: String,
        body: String,
    },
    BaseResolved {
        base: BranchName,
        sha: CommitSha,
    },
    CommitsFetched {
        commits: Vec<CommitSha>,
    },
    BranchCreated {
        head: BranchName,
        sha: CommitSha,
    },
    CommitsReplayed {
        head: BranchName,
        sha: CommitSha,
    },
    ReplayFailed {
        head: BranchName,
        error: String,
    },
    PullRequestCreated {
        number: PullRequestNumber,
    },
    RolledBack {
        head: BranchName,
        cause: ErrorKind,
    },
    RollbackFailed {
        head: BranchName,
        cause: ErrorKind,
        kind: ErrorKind,
        error: String,
    },
}

impl BackportEvent {
    /// Stable event name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            BackportEvent::Started { .. } => "started",
            BackportEvent::BaseResolved { .. } => "base_resolved",
            BackportEvent::CommitsFetched { .. } => "commits_fetched",
            BackportEvent::BranchCreated { .. } => "branch_created",
            BackportEvent::CommitsReplayed { .. } => "commits_replayed",
            BackportEvent::ReplayFailed { .. } => "replay_failed",
            BackportEvent::PullRequestCreated { .. } => "pull_request_created",
            BackportEvent::RolledBack { .. } => "rolled_back",
            BackportEvent::RollbackFailed { .. } => "rollback_failed",
        }
    }
}

/// A [`BackportEvent`] attributed to one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub operation_id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: BackportEvent,
}

/// Receiver of diagnostic records. Has no influence on control flow.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: &DiagnosticRecord);
}

/// Forwards records to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, record: &DiagnosticRecord) {
        let op = record.operation_id;
        match &record.event {
            BackportEvent::Started {
                repo,
                source,
                base,
                head,
                ..
            } => {
                info!(event = "backport.started", operation_id = %op, %repo, %source, %base, %head);
            }
            BackportEvent::BaseResolved { base, sha } => {
                debug!(event = "backport.base_resolved", operation_id = %op, %base, sha = %sha.short());
            }
            BackportEvent::CommitsFetched { commits } => {
                debug!(event = "backport.commits_fetched", operation_id = %op, count = commits.len());
            }
            BackportEvent::BranchCreated { head, sha } => {
                debug!(event = "backport.branch_created", operation_id = %op, %head, sha = %sha.short());
            }
            BackportEvent::CommitsReplayed { head, sha } => {
                debug!(event = "backport.commits_replayed", operation_id = %op, %head, sha = %sha.short());
            }
            BackportEvent::ReplayFailed { head, error } => {
                info!(event = "backport.replay_failed", operation_id = %op, %head, %error);
            }
            BackportEvent::PullRequestCreated { number } => {
                info!(event = "backport.pull_request_created", operation_id = %op, %number);
            }
            BackportEvent::RolledBack { head, cause } => {
                info!(event = "backport.rolled_back", operation_id = %op, %head, %cause);
            }
            BackportEvent::RollbackFailed {
                head, cause, error, ..
            } => {
                warn!(event = "backport.rollback_failed", operation_id = %op, %head, %cause, %error);
            }
        }
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<BackportEvent> {
        self.records().into_iter().map(|r| r.event).collect()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.records().iter().map(|r| r.event.name()).collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, record: &DiagnosticRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Sends several sinks the same records.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn DiagnosticSink>>) -> Self {
        Self { sinks }
    }
}

impl DiagnosticSink for FanoutSink {
    fn record(&self, record: &DiagnosticRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

/// Emitter bound to one operation id.
pub(crate) struct Diagnostics<'a> {
    operation_id: Uuid,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Diagnostics<'a> {
    pub(crate) fn new(sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            sink,
        }
    }

    pub(crate) fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub(crate) fn emit(&self, event: BackportEvent) {
        self.sink.record(&DiagnosticRecord {
            operation_id: self.operation_id,
            at: Utc::now(),
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_snake_case_tag() {
        let event = BackportEvent::PullRequestCreated {
            number: PullRequestNumber(9),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "pull_request_created");
        assert_eq!(json["number"], 9);
        assert_eq!(event.name(), "pull_request_created");
    }

    #[test]
    fn test_record_flattens_event_next_to_operation_id() {
        let record = DiagnosticRecord {
            operation_id: Uuid::nil(),
            at: Utc::now(),
            event: BackportEvent::RolledBack {
                head: BranchName::new("backport-1-to-main"),
                cause: ErrorKind::ReplayFailure,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "rolled_back");
        assert_eq!(json["cause"], "replay_failure");
        assert_eq!(json["operation_id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_recording_sink_tags_records_with_one_operation_id() {
        let sink = RecordingSink::new();
        let diagnostics = Diagnostics::new(&sink);
        diagnostics.emit(BackportEvent::CommitsFetched { commits: vec![] });
        diagnostics.emit(BackportEvent::PullRequestCreated {
            number: PullRequestNumber(1),
        });

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.operation_id == diagnostics.operation_id()));
        assert_eq!(sink.names(), vec!["commits_fetched", "pull_request_created"]);
    }

    #[test]
    fn test_fanout_sink_delivers_to_every_sink() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let sinks: Vec<Arc<dyn DiagnosticSink>> = vec![
            a.clone() as Arc<dyn DiagnosticSink>,
            b.clone() as Arc<dyn DiagnosticSink>,
            Arc::new(TracingSink),
        ];
        let fanout = FanoutSink::new(sinks);
        Diagnostics::new(&fanout).emit(BackportEvent::CommitsFetched { commits: vec![] });
        assert_eq!(a.records().len(), 1);
        assert_eq!(b.records().len(), 1);
    }
}
