//! Error types for playlist loading

/// Result type alias for playlist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while obtaining a playlist
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The playlist (or a track payload) could not be fetched
    #[error("Fetch failed for {url}: HTTP status {status}")]
    Fetch { url: String, status: u16 },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The playlist document is not a JSON array of `{title, url}`
    #[error("Invalid playlist document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    /// True for failures of the network exchange itself (status or transport)
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Http(_))
    }
}
