//! Backport GitHub: REST host for backport-core
//!
//! Implements [`backport_core::HostApi`] over the GitHub REST API and
//! [`backport_core::CommitReplayer`] as a server-side cherry-pick, so a
//! backport needs no local clone.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use backport_github::{GithubClient, GithubCherryPicker, GithubConfig};
//!
//! let client = Arc::new(GithubClient::new(GithubConfig::from_env())?);
//! let picker = Arc::new(GithubCherryPicker::new(client.clone()));
//! let backporter = backport_core::Backporter::new(client, picker);
//! ```

mod api;
pub mod cherry_pick;
pub mod client;
pub mod config;
pub mod error;

pub use api::{GitActor, GitCommit};
pub use cherry_pick::GithubCherryPicker;
pub use client::GithubClient;
pub use config::{GithubConfig, DEFAULT_API_URL};
pub use error::GithubError;
