//! HTTP client for the playlist document
//!
//! The playlist is a plain JSON array of `{ "title": ..., "url": ... }`
//! served over `GET`, with no authentication, pagination or versioning.
//!
//! # Example
//!
//! ```no_run
//! use brspplaylist::PlaylistClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PlaylistClient::new()?;
//!     let playlist = client.fetch("https://example.com/playlist.json").await?;
//!     println!("{} tracks", playlist.len());
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::track::{Playlist, Track};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "BRSP-Widget/0.1 (brspplaylist)";

/// Playlist HTTP client
///
/// Stateless: every call to [`PlaylistClient::fetch`] hits the network.
#[derive(Debug, Clone)]
pub struct PlaylistClient {
    client: Client,
    timeout: Duration,
}

impl PlaylistClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client with a custom reqwest::Client
    ///
    /// Useful for sharing the connection pool with the playback backends.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Fetch and decode the playlist at `url`
    ///
    /// Non-success statuses yield [`Error::Fetch`], malformed documents
    /// [`Error::Parse`]. Entries without a URL are dropped since they can
    /// never play. An empty array is a valid (empty) playlist.
    pub async fn fetch(&self, url: &str) -> Result<Playlist> {
        debug!(url, "Fetching playlist");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Playlist request rejected");
            return Err(Error::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let playlist = Self::parse(&body)?;

        info!(url, tracks = playlist.len(), "Playlist loaded");
        Ok(playlist)
    }

    /// Decode a playlist document
    pub fn parse(body: &[u8]) -> Result<Playlist> {
        let tracks: Vec<Track> = serde_json::from_slice(body)?;
        let total = tracks.len();

        let playlist: Playlist = tracks
            .into_iter()
            .filter(|track| !track.url.trim().is_empty())
            .collect();

        if playlist.len() < total {
            warn!(
                dropped = total - playlist.len(),
                "Ignoring playlist entries without URL"
            );
        }

        Ok(playlist)
    }
}

/// Builder for configuring a PlaylistClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    timeout: Duration,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<PlaylistClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(PlaylistClient {
            client,
            timeout: self.timeout,
        })
    }
}
