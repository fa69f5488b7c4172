//! Reachability probe run before any backend attempt
//!
//! A `HEAD` request tells us whether a track exists without downloading it,
//! so a dead link is skipped immediately instead of after three failed
//! backends.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout of a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lightweight existence check for a track URL
///
/// Implementations never fail: any problem is reported as unreachable.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, url: &str) -> bool;
}

/// Probe issuing `HEAD <url>`
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url, status = %response.status(), "Track reachable");
                true
            }
            Ok(response) => {
                warn!(url, status = %response.status(), "Track unreachable");
                false
            }
            Err(e) => {
                warn!(url, error = %e, "Track probe failed");
                false
            }
        }
    }
}
