//! Extension pour lire les réglages du lecteur depuis brspconfig
//!
//! ```no_run
//! use brspconfig::get_config;
//! use brspplayer::PlayerConfigExt;
//!
//! let settings = get_config().player_settings();
//! println!("Backends: {:?}", settings.backends);
//! ```

use crate::backend::BackendKind;
use crate::selector::DEFAULT_ATTEMPT_TIMEOUT;
use brspconfig::Config;
use std::time::Duration;
use tracing::warn;

/// Default timeout for playlist fetch and blob download
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent sent by the player's HTTP client
pub const DEFAULT_USER_AGENT: &str = "BRSP-Widget/0.1 (brspplayer)";

/// Everything the player needs from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    pub playlist_url: String,
    pub probe_enabled: bool,
    pub backends: Vec<BackendKind>,
    pub attempt_timeout: Duration,
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            playlist_url: brspconfig::DEFAULT_PLAYLIST_URL.to_string(),
            probe_enabled: false,
            backends: BackendKind::DEFAULT_ORDER.to_vec(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Trait d'extension de `brspconfig::Config` pour le lecteur
pub trait PlayerConfigExt {
    /// Backend order, unknown names dropped
    fn backend_kinds(&self) -> Vec<BackendKind>;

    fn player_settings(&self) -> PlayerSettings;
}

impl PlayerConfigExt for Config {
    fn backend_kinds(&self) -> Vec<BackendKind> {
        parse_backends(&self.get_backend_names())
    }

    fn player_settings(&self) -> PlayerSettings {
        let defaults = PlayerSettings::default();

        let probe_enabled = self.get_probe_enabled().unwrap_or_else(|e| {
            warn!(error = %e, "Cannot read probe setting, probing disabled");
            defaults.probe_enabled
        });
        let attempt_timeout = self
            .get_load_timeout_secs()
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(defaults.attempt_timeout);
        let http_timeout = self
            .get_http_timeout_secs()
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(defaults.http_timeout);

        PlayerSettings {
            playlist_url: self.get_playlist_url(),
            probe_enabled,
            backends: self.backend_kinds(),
            attempt_timeout,
            http_timeout,
            user_agent: self.get_user_agent(),
        }
    }
}

/// Parses backend names in order, dropping unknown names and duplicates
///
/// Falls back to [`BackendKind::DEFAULT_ORDER`] when nothing usable remains.
pub fn parse_backends<S: AsRef<str>>(names: &[S]) -> Vec<BackendKind> {
    let mut kinds = Vec::new();
    for name in names {
        match name.as_ref().parse::<BackendKind>() {
            Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Ok(_) => {}
            Err(e) => warn!("{}, ignored", e),
        }
    }

    if kinds.is_empty() {
        warn!("No usable backend configured, using default order");
        BackendKind::DEFAULT_ORDER.to_vec()
    } else {
        kinds
    }
}
