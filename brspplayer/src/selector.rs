//! Backend selection: the ordered fallback chain
//!
//! ```text
//! Idle -> Attempting(B1) -> Ready(B1)
//!              |
//!              +-> release(B1) -> Attempting(B2) -> Ready(B2)
//!                                      |
//!                                      +-> release(B2) -> ... -> AllFailed
//! ```
//!
//! Every attempt (open + readiness) runs under a guard deadline, so a
//! backend that never calls back is treated as failed. The cancellation
//! token is checked at every suspension point; a cancelled attempt releases
//! whatever it already acquired before returning.

use crate::backend::{ActiveBackend, BackendKind, EndedSignal, PlaybackStrategy};
use crate::error::BackendError;
use brspplaylist::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default guard timeout of one backend attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of a selection run
#[derive(Debug)]
pub enum Selection {
    /// A backend signalled readiness
    Ready(ActiveBackend),
    /// Every strategy failed, in order
    AllFailed(Vec<(BackendKind, BackendError)>),
    /// The attempt was superseded
    Cancelled,
}

enum Attempt {
    Ready(ActiveBackend),
    Failed(BackendError),
    Cancelled,
}

/// Tries strategies strictly in sequence until one is ready
pub struct BackendSelector {
    strategies: Vec<Arc<dyn PlaybackStrategy>>,
    attempt_timeout: Duration,
}

impl BackendSelector {
    pub fn new(strategies: Vec<Arc<dyn PlaybackStrategy>>, attempt_timeout: Duration) -> Self {
        Self {
            strategies,
            attempt_timeout,
        }
    }

    /// Backend kinds in attempt order
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Runs the fallback chain for `track`
    ///
    /// A failed strategy's partial backend is released before the next one
    /// is opened.
    pub async fn select(
        &self,
        track: &Track,
        ended: &EndedSignal,
        cancel: &CancellationToken,
    ) -> Selection {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Selection::Cancelled;
            }

            let kind = strategy.kind();
            debug!(backend = %kind, url = %track.url, "Attempting backend");

            match self.attempt(strategy.as_ref(), track, ended, cancel).await {
                Attempt::Ready(backend) => {
                    info!(backend = %kind, title = %track.display_title(), "Backend ready");
                    return Selection::Ready(backend);
                }
                Attempt::Failed(e) => {
                    warn!(backend = %kind, url = %track.url, error = %e, "Backend failed, falling back");
                    failures.push((kind, e));
                }
                Attempt::Cancelled => {
                    debug!(backend = %kind, url = %track.url, "Backend attempt cancelled");
                    return Selection::Cancelled;
                }
            }
        }

        warn!(url = %track.url, tried = failures.len(), "All backends failed");
        Selection::AllFailed(failures)
    }

    async fn attempt(
        &self,
        strategy: &dyn PlaybackStrategy,
        track: &Track,
        ended: &EndedSignal,
        cancel: &CancellationToken,
    ) -> Attempt {
        let kind = strategy.kind();
        let deadline = Instant::now() + self.attempt_timeout;
        let timed_out = || BackendError::Timeout {
            kind,
            after: self.attempt_timeout,
        };

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = timeout_at(deadline, strategy.open(track, ended.clone())) => Some(res),
        };

        let mut backend = match opened {
            None => return Attempt::Cancelled,
            Some(Ok(Ok(backend))) => backend,
            Some(Ok(Err(e))) => return Attempt::Failed(e),
            Some(Err(_)) => return Attempt::Failed(timed_out()),
        };

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = timeout_at(deadline, backend.ready()) => Some(res),
        };

        match ready {
            Some(Ok(Ok(()))) => Attempt::Ready(backend),
            Some(Ok(Err(e))) => {
                backend.release().await;
                Attempt::Failed(e)
            }
            Some(Err(_)) => {
                backend.release().await;
                Attempt::Failed(timed_out())
            }
            None => {
                backend.release().await;
                Attempt::Cancelled
            }
        }
    }
}
