//! Error types for backport-github

use backport_core::HostError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while setting up the GitHub client.
///
/// Failures of individual API calls are reported as [`HostError`].
#[derive(Error, Debug)]
pub enum GithubError {
    /// No token configured
    #[error("no GitHub token configured (set GITHUB_TOKEN or pass --token)")]
    MissingToken,

    /// Token contains characters not allowed in a header
    #[error("GitHub token is not a valid header value")]
    InvalidToken,

    /// API root is not an absolute http(s) URL
    #[error("invalid GitHub API URL `{0}`")]
    InvalidApiUrl(String),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        GithubError::Http(err.to_string())
    }
}

/// Map a non-success response to a [`HostError`].
///
/// `what` names the resource, `message` is GitHub's `message` field.
pub(crate) fn classify_status(status: StatusCode, what: &str, message: &str) -> HostError {
    let detail = if message.is_empty() {
        format!("{what} ({status})")
    } else {
        format!("{what}: {message} ({status})")
    };
    match status {
        StatusCode::NOT_FOUND => HostError::NotFound(detail),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => HostError::Conflict(detail),
        _ => HostError::Transport(detail),
    }
}

/// Map a transport-level failure.
pub(crate) fn transport(what: &str, err: reqwest::Error) -> HostError {
    HostError::Transport(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        let err = classify_status(StatusCode::NOT_FOUND, "ref heads/x", "Not Found");
        assert_eq!(
            err,
            HostError::NotFound("ref heads/x: Not Found (404 Not Found)".to_string())
        );
    }

    #[test]
    fn test_validation_failures_are_conflicts() {
        let err = classify_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            "create ref refs/heads/x",
            "Reference already exists",
        );
        assert!(matches!(err, HostError::Conflict(ref m) if m.contains("already exists")));
        assert!(matches!(
            classify_status(StatusCode::CONFLICT, "merge", ""),
            HostError::Conflict(_)
        ));
    }

    #[test]
    fn test_auth_and_rate_limit_are_transport_failures() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
        ] {
            assert!(matches!(
                classify_status(status, "x", "y"),
                HostError::Transport(_)
            ));
        }
    }

    #[test]
    fn test_missing_token_message_names_env_var() {
        assert!(GithubError::MissingToken.to_string().contains("GITHUB_TOKEN"));
    }
}
