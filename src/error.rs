//! Error taxonomy for the extraction pipeline.
//!
//! Every core operation returns [`ScrapeError`]. The variants map onto the
//! recovery strategy the caller applies:
//!
//! | Class | Variants | Recovery |
//! |-------|----------|----------|
//! | Transient network | [`Http`](ScrapeError::Http), [`Status`](ScrapeError::Status) | retried with backoff by the fetcher |
//! | Transient render | [`Timeout`](ScrapeError::Timeout), [`Render`](ScrapeError::Render) | retried with backoff by the renderer |
//! | Fatal session | [`Session`](ScrapeError::Session) | session rotation, current post skipped |
//! | Precondition | [`Precondition`](ScrapeError::Precondition) | run aborted |
//! | Unexpected | everything else | post skipped, or run aborted at top level |

use std::time::Duration;

use chromiumoxide::error::CdpError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Transport failure talking to a remote host.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote host answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A bounded wait expired before its condition held.
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// A page-level automation fault; the session itself is still usable.
    #[error("render error: {0}")]
    Render(String),

    /// The browser session is unusable and must be replaced.
    #[error("browser session failure: {0}")]
    Session(String),

    /// A required input is missing; nothing should be attempted.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A per-post document could not be produced.
    #[error("document error: {0}")]
    Document(String),

    /// Newsletter markup did not contain what we expected.
    #[error("scrape error for {context}: {message}")]
    Scrape { context: String, message: String },
}

impl ScrapeError {
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::Document(message.into())
    }

    pub fn scrape(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scrape {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            waited,
        }
    }

    /// The session handle that produced this error can no longer be used.
    pub fn is_fatal_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    /// Worth another attempt after a backoff delay.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Status { .. } | Self::Timeout { .. } | Self::Render(_) => true,
            _ => false,
        }
    }
}

impl From<CdpError> for ScrapeError {
    fn from(e: CdpError) -> Self {
        match e {
            // The websocket or the handler task is gone: the browser is dead.
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                Self::Session(e.to_string())
            }
            CdpError::Timeout => Self::Render("CDP request timed out".to_string()),
            other => Self::Render(other.to_string()),
        }
    }
}
