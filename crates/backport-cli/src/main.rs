//! Backport CLI
//!
//! The `backport` command cherry-picks the commits of a GitHub pull request
//! onto another branch and opens a pull request for them.
//!
//! ```text
//! backport --repo owner/name --pull-request 42 --base release/1.0
//! ```
//!
//! The working branch is deleted again if anything fails after it was
//! created.

use anyhow::{Context, Result};
use backport_core::{
    BackportError, BackportRequest, Backporter, DiagnosticRecord, DiagnosticSink, ErrorKind,
    FanoutSink, PullRequestNumber, RecordingSink, RepoId, TracingSink,
};
use backport_github::{GithubCherryPicker, GithubClient, GithubConfig, DEFAULT_API_URL};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "backport")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Backport a GitHub pull request onto another branch", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON result on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Repository as `owner/name`
    #[arg(long)]
    repo: RepoId,

    /// Number of the pull request to backport
    #[arg(long = "pull-request", short = 'p')]
    pull_request: u64,

    /// Branch to backport onto
    #[arg(long, short = 'b')]
    base: String,

    /// Working branch (default: backport-<n>-to-<base>)
    #[arg(long)]
    head: Option<String>,

    /// Title of the new pull request (default: derived from the original)
    #[arg(long)]
    title: Option<String>,

    /// Body of the new pull request (default: "Backport #<n>.")
    #[arg(long)]
    body: Option<String>,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub REST API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

impl Cli {
    fn request(&self) -> BackportRequest {
        let mut request = BackportRequest::new(self.pull_request, self.base.as_str());
        if let Some(head) = &self.head {
            request = request.with_head(head.as_str());
        }
        if let Some(title) = &self.title {
            request = request.with_title(title.as_str());
        }
        if let Some(body) = &self.body {
            request = request.with_body(body.as_str());
        }
        request
    }

    fn github_config(&self) -> GithubConfig {
        let config = GithubConfig::new(&self.api_url);
        match self.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => config.with_token(token),
            None => config,
        }
    }
}

/// `--json` output
#[derive(Debug, Serialize)]
struct Outcome {
    repo: String,
    base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request: Option<PullRequestNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    events: Vec<DiagnosticRecord>,
}

impl Outcome {
    fn new(
        cli: &Cli,
        result: &std::result::Result<PullRequestNumber, BackportError>,
        events: Vec<DiagnosticRecord>,
    ) -> Self {
        let (pull_request, error, kind) = match result {
            Ok(number) => (Some(*number), None, None),
            Err(err) => (None, Some(err.to_string()), Some(err.kind())),
        };
        Outcome {
            repo: cli.repo.to_string(),
            base: cli.base.clone(),
            pull_request,
            error,
            kind,
            events,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    backport_core::init_tracing(cli.json, level);

    cmd_backport(&cli).await
}

async fn cmd_backport(cli: &Cli) -> Result<()> {
    let client = Arc::new(
        GithubClient::new(cli.github_config()).context("Failed to set up GitHub client")?,
    );
    let picker = Arc::new(GithubCherryPicker::new(client.clone()));

    let recording = Arc::new(RecordingSink::new());
    let sink = FanoutSink::new(vec![
        Arc::new(TracingSink) as Arc<dyn DiagnosticSink>,
        recording.clone() as Arc<dyn DiagnosticSink>,
    ]);
    let backporter = Backporter::new(client, picker).with_sink(Arc::new(sink));

    let result = backporter.backport(&cli.repo, &cli.request()).await;

    if cli.json {
        let outcome = Outcome::new(cli, &result, recording.records());
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    let number = result.with_context(|| {
        format!(
            "Failed to backport {} onto {} in {}",
            PullRequestNumber(cli.pull_request),
            cli.base,
            cli.repo
        )
    })?;

    info!(%number, "backport opened");
    if !cli.json {
        println!("{}", number.get());
    }
    Ok(())
}
