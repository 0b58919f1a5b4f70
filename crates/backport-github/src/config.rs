//! GitHub connection settings.

use serde::{Deserialize, Serialize};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API root, e.g. `https://api.github.com` or
    /// `https://ghe.example.com/api/v3`
    pub api_url: String,
    /// Token sent as `Authorization: Bearer`. Required for any write.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// `User-Agent` header; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            user_agent: default_user_agent(),
        }
    }
}

impl GithubConfig {
    /// Read `GITHUB_API_URL` and `GITHUB_TOKEN`.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific API root, without credentials
    pub fn new(api_url: &str) -> Self {
        GithubConfig {
            api_url: api_url.to_string(),
            token: None,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// API root without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

fn default_user_agent() -> String {
    format!("backport-github/{}", env!("CARGO_PKG_VERSION"))
}
