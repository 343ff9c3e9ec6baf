//! Error types for each stage of a usage report run.

use thiserror::Error;

/// Errors raised while exchanging client credentials for a bearer token.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity endpoint could not be reached.
    #[error("token request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The identity endpoint answered with a non-success status.
    #[error("token request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The token response carried no `access_token` field.
    #[error("token response did not contain an access token")]
    MissingAccessToken,

    /// The token response body was not valid JSON.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Errors raised while paging through the activity log.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The token was rejected (401/403), expired or under-scoped.
    #[error("unauthorized ({status}): token invalid, expired or missing admin scope")]
    Unauthorized { status: u16 },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The response body lacked the event list or was not JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Network-level failure (timeout, connection reset, DNS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server kept supplying continuation links past the safety cap.
    #[error("more than {cap} pages returned, giving up")]
    TooManyPages { cap: usize },

    /// The caller cancelled the run between pages.
    #[error("fetch cancelled")]
    Cancelled,

    /// The overall fetch deadline elapsed.
    #[error("fetch deadline exceeded")]
    DeadlineExceeded,
}

impl FetchError {
    /// Whether a failed page request may be attempted again.
    ///
    /// `Unauthorized` is never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors raised while writing the ranked table.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Filesystem error creating or flushing the output.
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Invalid time window.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    /// `start` was not strictly before `end`.
    #[error("window start {start} must be before end {end}")]
    Inverted { start: String, end: String },

    /// A trailing window needs at least one day.
    #[error("window size must be at least one day")]
    Empty,
}

/// Stage-tagged failure of a whole run.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("time window: {0}")]
    Window(#[from] WindowError),

    #[error("authentication: {0}")]
    Auth(#[from] AuthError),

    #[error("activity fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("output: {0}")]
    Sink(#[from] SinkError),
}
