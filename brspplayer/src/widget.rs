//! UI surface of the widget
//!
//! Each button maps to one call on the [`Player`]; the collapse toggle only
//! touches the persisted [`UiState`].

use crate::backend::{AudioPlatform, VisualizerSink};
use crate::config_ext::PlayerConfigExt;
use crate::error::Result;
use crate::player::{LoadOutcome, Player, PlayerStatus};
use brspconfig::{Config, UiState};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub struct Widget {
    player: Arc<Player>,
    ui_state: UiState,
    playlist_url: String,
}

impl Widget {
    pub fn new(player: Arc<Player>, ui_state: UiState, playlist_url: impl Into<String>) -> Self {
        Self {
            player,
            ui_state,
            playlist_url: playlist_url.into(),
        }
    }

    /// Widget wired from the configuration: settings, UI state and playlist URL
    pub fn from_config(
        config: &Config,
        platform: Arc<dyn AudioPlatform>,
        visualizer: Arc<dyn VisualizerSink>,
    ) -> Result<Self> {
        let settings = config.player_settings();
        let player = Player::from_settings(platform, visualizer, &settings)?;
        Ok(Self::new(player, config.ui_state(), settings.playlist_url))
    }

    /// Starts the event loop and loads the playlist
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> Result<LoadOutcome> {
        info!(url = %self.playlist_url, collapsed = self.is_collapsed(), "Starting widget");
        self.player.spawn_event_loop();
        self.player.load_playlist(&self.playlist_url).await
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn playlist_url(&self) -> &str {
        &self.playlist_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerStatus> {
        self.player.subscribe()
    }

    /// Title shown in the widget header
    pub async fn title(&self) -> Option<String> {
        self.player
            .current_track()
            .await
            .map(|t| t.display_title().to_string())
    }

    pub async fn press_play(&self) -> Result<()> {
        self.player.toggle_play().await
    }

    pub async fn press_next(&self) -> Result<LoadOutcome> {
        self.player.next().await
    }

    pub async fn press_previous(&self) -> Result<LoadOutcome> {
        self.player.previous().await
    }

    pub async fn press_random(&self) -> Result<LoadOutcome> {
        self.player.random().await
    }

    /// Closes the player and forgets the collapse flag
    pub async fn press_close(&self) -> Result<()> {
        self.player.close().await?;
        self.ui_state.clear()?;
        Ok(())
    }

    /// Returns the new state
    pub fn toggle_collapse(&self) -> Result<bool> {
        Ok(self.ui_state.toggle_collapsed()?)
    }

    pub fn is_collapsed(&self) -> bool {
        self.ui_state.is_collapsed()
    }
}
