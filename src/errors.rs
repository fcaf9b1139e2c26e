//! # Error Types Module
//!
//! This module defines the error type shared by the authentication, fetch,
//! storage and recommendation stages. Front-ends render these as
//! human-readable text; none of them is fatal except a missing
//! configuration value at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of body characters kept in diagnostic errors
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors produced by the order pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Login page or CSRF endpoint did not yield a token
    #[error("could not obtain CSRF token: {reason}")]
    Token { reason: String },

    /// Login endpoint rejected the credentials or returned no access token
    #[error("login failed{}: {reason}", status_suffix(.status))]
    Credential { status: Option<u16>, reason: String },

    /// Orders API returned a non-success status or an unreadable body
    #[error("order fetch failed{}: {body}", status_suffix(.status))]
    Fetch { status: Option<u16>, body: String },

    /// Text-generation API call failed
    #[error("external service error{}: {body}", status_suffix(.status))]
    ExternalService { status: Option<u16>, body: String },

    /// Required credential or key is absent from the environment
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// No normalized order history exists yet
    #[error("no order history found at {}", .path.display())]
    MissingHistory { path: PathBuf },

    /// Reading or writing an on-disk artifact failed
    #[error("artifact I/O error for {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub(crate) fn artifact(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Artifact {
            path: path.into(),
            source,
        }
    }
}

/// Truncate a response body for inclusion in an error, on a char boundary
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
