//! Error types for playback

use crate::backend::BackendKind;
use std::time::Duration;

/// Failure of a single backend attempt
///
/// These never leave the selector: they are logged, collected and turn into
/// a fallback to the next backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend rejected or could not decode the resource
    #[error("{kind} backend could not decode {url}: {message}")]
    Decode {
        kind: BackendKind,
        url: String,
        message: String,
    },

    /// Blob download returned a non-success status
    #[error("Fetch failed for {url}: HTTP status {status}")]
    Fetch { url: String, status: u16 },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Local spool file for the blob backend
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend never signalled readiness nor failure
    #[error("{kind} backend did not answer within {after:?}")]
    Timeout { kind: BackendKind, after: Duration },

    /// The native layer refused the operation (e.g. play before user gesture)
    #[error("{0}")]
    Platform(String),
}

impl BackendError {
    pub fn decode(kind: BackendKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }
}

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors surfaced by the transport controller
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Playlist could not be fetched or decoded
    #[error("Playlist load failed: {0}")]
    Playlist(#[from] brspplaylist::Error),

    /// Transport command rejected by the active backend
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Persisted UI state could not be read or written
    #[error("UI state error: {0}")]
    UiState(#[from] anyhow::Error),

    /// Requested track index does not exist
    #[error("Track index {index} out of range (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The widget was closed
    #[error("Player is closed")]
    Closed,
}
