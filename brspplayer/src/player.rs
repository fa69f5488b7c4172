//! Transport controller
//!
//! [`Player`] owns the playlist, the current index and at most one
//! [`PlaybackSession`]. Every load goes through the same path:
//!
//! 1. bump the generation and cancel the attempt in flight, if any
//! 2. wait for that attempt to unwind (it releases its partial backend)
//! 3. release the previous session
//! 4. probe (optional), then run the backend selector
//! 5. install the new session only if its generation is still current
//!
//! When a track cannot be played the player moves on in the current
//! traversal order, skipping tracks that already failed during this load,
//! and gives up once every track of the playlist has failed.

use crate::backend::{
    strategies_for, ActiveBackend, AudioPlatform, BackendKind, EndedSignal, NoVisualizer,
    PlaybackStrategy, PlayerEvent, VisualizerSink,
};
use crate::config_ext::{PlayerSettings, DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT};
use crate::error::{BackendError, PlayerError, Result};
use crate::probe::{HttpProbe, ReachabilityProbe};
use crate::selector::{BackendSelector, Selection, DEFAULT_ATTEMPT_TIMEOUT};
use crate::session::PlaybackSession;
use brspplaylist::{sequencer, Direction, Playlist, PlaylistClient, RandomSequencer, Track};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// State changes published to the UI shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Playlist fetch started
    Loading { url: String },
    Playing {
        index: usize,
        title: String,
        backend: BackendKind,
    },
    /// Track prepared or paused
    Paused { index: usize, title: String },
    Stopped,
    /// Every backend failed for this track, moving on
    Skipped { index: usize, title: String },
    /// The probe rejected this track, moving on
    Unreachable { index: usize, title: String },
    /// A full cycle of tracks failed
    AllUnplayable { attempts: usize },
    LoadFailed { message: String },
    EmptyPlaylist,
    Closed,
}

/// Result of a load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A session is live for `index`
    Ready {
        index: usize,
        backend: BackendKind,
        playing: bool,
    },
    /// A newer request took over before this one finished
    Superseded,
    /// Nothing to play
    Empty,
    /// Every track of one full cycle failed
    AllUnplayable,
}

/// Order in which tracks are visited, also used to skip failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Linear(Direction),
    Random,
}

struct PlayerState {
    playlist: Playlist,
    current_index: usize,
    session: Option<PlaybackSession>,
    attempt: Option<CancellationToken>,
    random: RandomSequencer,
    closed: bool,
}

impl PlayerState {
    /// Cancels the attempt in flight
    fn cancel_attempt(&mut self) {
        if let Some(token) = self.attempt.take() {
            token.cancel();
        }
    }
}

/// One widget instance: playlist, sequencing and the live session
pub struct Player {
    platform: Arc<dyn AudioPlatform>,
    visualizer: Arc<dyn VisualizerSink>,
    selector: BackendSelector,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    playlist_client: PlaylistClient,

    generation: AtomicU64,
    state: Mutex<PlayerState>,
    // Sérialise les tentatives : la suivante attend que la précédente ait libéré
    attempt_lock: Mutex<()>,

    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PlayerEvent>>>,
    status_tx: broadcast::Sender<PlayerStatus>,
    shutdown: CancellationToken,
}

impl Player {
    /// Builder of a player driving `platform`
    ///
    /// Track-ended events are queued until [`Player::run_events`] or
    /// [`Player::spawn_event_loop`] drains them; a player used without one
    /// of these never advances on its own and keeps the events queued.
    pub fn builder(platform: Arc<dyn AudioPlatform>) -> PlayerBuilder {
        PlayerBuilder::new(platform)
    }

    /// Player configured from [`PlayerSettings`]
    pub fn from_settings(
        platform: Arc<dyn AudioPlatform>,
        visualizer: Arc<dyn VisualizerSink>,
        settings: &PlayerSettings,
    ) -> Result<Arc<Self>> {
        Self::builder(platform)
            .visualizer(visualizer)
            .settings(settings)
            .build()
    }

    /// Receiver of status updates
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerStatus> {
        self.status_tx.subscribe()
    }

    /// Backend kinds in fallback order
    pub fn backends(&self) -> Vec<BackendKind> {
        self.selector.kinds()
    }

    pub async fn playlist(&self) -> Playlist {
        self.state.lock().await.playlist.clone()
    }

    pub async fn current_index(&self) -> usize {
        self.state.lock().await.current_index
    }

    pub async fn current_track(&self) -> Option<Track> {
        let state = self.state.lock().await;
        state.playlist.get(state.current_index).cloned()
    }

    /// Backend of the live session, `None` when no session exists
    pub async fn current_backend(&self) -> Option<BackendKind> {
        self.state
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.backend_kind())
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.state.lock().await.session.as_ref().map(|s| s.id())
    }

    pub async fn is_playing(&self) -> bool {
        self.state
            .lock()
            .await
            .session
            .as_ref()
            .is_some_and(|s| s.is_playing())
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    // ========================================================================
    // Playlist
    // ========================================================================

    /// Fetches the playlist at `url` and prepares its first track
    ///
    /// A fetch failure is terminal: [`PlayerStatus::LoadFailed`] is published
    /// and nothing is retried.
    pub async fn load_playlist(&self, url: &str) -> Result<LoadOutcome> {
        if self.is_closed().await {
            return Err(PlayerError::Closed);
        }

        info!(url, "Loading playlist");
        self.emit(PlayerStatus::Loading {
            url: url.to_string(),
        });

        match self.playlist_client.fetch(url).await {
            Ok(playlist) => self.set_playlist(playlist).await,
            Err(e) => {
                error!(url, error = %e, "Playlist load failed");
                self.emit(PlayerStatus::LoadFailed {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Replaces the playlist and prepares its first track without playing it
    pub async fn set_playlist(&self, playlist: Playlist) -> Result<LoadOutcome> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(PlayerError::Closed);
            }

            state.cancel_attempt();
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(session) = state.session.take() {
                session.release(self.visualizer.as_ref()).await;
            }

            state.playlist = playlist;
            state.current_index = 0;
            state.random.reset();
        }

        self.load_index(0, Traversal::Linear(Direction::Forward), false)
            .await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Starts or resumes playback
    ///
    /// Without a session the current track is loaded first.
    pub async fn play(&self) -> Result<()> {
        let index = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if state.closed {
                return Err(PlayerError::Closed);
            }
            if state.playlist.is_empty() {
                self.emit(PlayerStatus::EmptyPlaylist);
                return Ok(());
            }

            match state.session.as_mut() {
                Some(session) => {
                    if session.is_playing() {
                        return Ok(());
                    }
                    self.start_playback(session).await?;
                    self.emit(PlayerStatus::Playing {
                        index: session.track_index(),
                        title: title_at(&state.playlist, session.track_index()),
                        backend: session.backend_kind(),
                    });
                    return Ok(());
                }
                None => state.current_index,
            }
        };

        self.load_index(index, Traversal::Linear(Direction::Forward), true)
            .await
            .map(|_| ())
    }

    /// Pauses the live session; no-op without one
    pub async fn pause(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.closed {
            return Err(PlayerError::Closed);
        }

        if let Some(session) = state.session.as_mut() {
            if session.is_playing() {
                session.pause().await?;
                self.emit(PlayerStatus::Paused {
                    index: session.track_index(),
                    title: title_at(&state.playlist, session.track_index()),
                });
            }
        }
        Ok(())
    }

    /// Play/pause button
    pub async fn toggle_play(&self) -> Result<()> {
        if self.is_playing().await {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Releases the live session and abandons any load in flight
    ///
    /// The playlist and the current index are kept; `play()` reloads.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(PlayerError::Closed);
        }

        state.cancel_attempt();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = state.session.take() {
            session.release(self.visualizer.as_ref()).await;
        }
        drop(state);

        info!("Playback stopped");
        self.emit(PlayerStatus::Stopped);
        Ok(())
    }

    /// Stops everything and refuses further commands. Idempotent.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.cancel_attempt();
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(session) = state.session.take() {
                session.release(self.visualizer.as_ref()).await;
            }
        }

        self.shutdown.cancel();
        info!("Player closed");
        self.emit(PlayerStatus::Closed);
        Ok(())
    }

    /// Loads `index` and plays it
    ///
    /// On failure the player skips forward. No-op on an empty playlist.
    pub async fn load_and_play(&self, index: usize) -> Result<LoadOutcome> {
        self.load_index(index, Traversal::Linear(Direction::Forward), true)
            .await
    }

    pub async fn next(&self) -> Result<LoadOutcome> {
        self.step_and_load(Traversal::Linear(Direction::Forward))
            .await
    }

    pub async fn previous(&self) -> Result<LoadOutcome> {
        self.step_and_load(Traversal::Linear(Direction::Backward))
            .await
    }

    /// Plays a track not yet drawn in the current random round
    pub async fn random(&self) -> Result<LoadOutcome> {
        self.step_and_load(Traversal::Random).await
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Applies a native-layer event
    ///
    /// An `Ended` from a session that is no longer live is ignored.
    pub async fn handle_event(&self, event: PlayerEvent) -> Result<Option<LoadOutcome>> {
        match event {
            PlayerEvent::Ended { generation } => {
                {
                    let mut state = self.state.lock().await;
                    if state.closed {
                        return Ok(None);
                    }
                    match state.session.as_mut() {
                        Some(session) if session.generation() == generation => {
                            session.mark_ended();
                        }
                        _ => {
                            debug!(generation, "Ignoring ended event from a stale session");
                            return Ok(None);
                        }
                    }
                }

                info!(generation, "Track ended, advancing");
                self.next().await.map(Some)
            }
        }
    }

    /// Drains native-layer events until the player is closed
    pub async fn run_events(self: Arc<Self>) {
        let Some(mut rx) = self.events_rx.lock().await.take() else {
            warn!("Player event loop already running");
            return;
        };

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!(error = %e, "Failed to handle player event");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("Player event loop stopped");
    }

    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_events())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&self, status: PlayerStatus) {
        debug!(?status, "Player status");
        // Pas d'abonné : rien à faire
        let _ = self.status_tx.send(status);
    }

    async fn start_playback(
        &self,
        session: &mut PlaybackSession,
    ) -> std::result::Result<(), BackendError> {
        if self.platform.output_suspended() {
            debug!("Resuming suspended audio output");
            self.platform.resume_output().await?;
        }
        session.play().await
    }

    async fn step_and_load(&self, traversal: Traversal) -> Result<LoadOutcome> {
        let index = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(PlayerError::Closed);
            }
            let len = state.playlist.len();
            let current = state.current_index;
            let step = match traversal {
                Traversal::Linear(direction) => sequencer::next(current, direction, len),
                Traversal::Random => state.random.random_next(len),
            };
            match step {
                Some(index) => index,
                None => {
                    self.emit(PlayerStatus::EmptyPlaylist);
                    return Ok(LoadOutcome::Empty);
                }
            }
        };

        self.load_index(index, traversal, true).await
    }

    /// Next candidate after `index` failed, never one of `failed`
    async fn skip_from(
        &self,
        index: usize,
        traversal: Traversal,
        len: usize,
        failed: &HashSet<usize>,
    ) -> Option<usize> {
        match traversal {
            Traversal::Linear(direction) => {
                let mut next = index;
                for _ in 0..len {
                    next = sequencer::next(next, direction, len)?;
                    if !failed.contains(&next) {
                        return Some(next);
                    }
                }
                None
            }
            Traversal::Random => self
                .state
                .lock()
                .await
                .random
                .random_next_excluding(len, failed),
        }
    }

    async fn load_index(
        &self,
        start: usize,
        traversal: Traversal,
        autoplay: bool,
    ) -> Result<LoadOutcome> {
        let mut index = start;
        let mut failed: HashSet<usize> = HashSet::new();
        let mut previous: Option<u64> = None;

        loop {
            let (generation, token) = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(PlayerError::Closed);
                }
                // Un skip ne doit pas écraser une demande plus récente
                if previous.is_some_and(|g| g != self.generation.load(Ordering::SeqCst)) {
                    return Ok(LoadOutcome::Superseded);
                }

                let len = state.playlist.len();
                if len == 0 {
                    self.emit(PlayerStatus::EmptyPlaylist);
                    return Ok(LoadOutcome::Empty);
                }
                if index >= len {
                    return Err(PlayerError::IndexOutOfRange { index, len });
                }

                let token = CancellationToken::new();
                state.cancel_attempt();
                state.attempt = Some(token.clone());
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                (generation, token)
            };
            previous = Some(generation);

            let attempt_guard = self.attempt_lock.lock().await;

            let (track, len) = {
                let mut state = self.state.lock().await;
                if token.is_cancelled() {
                    return Ok(LoadOutcome::Superseded);
                }
                if let Some(session) = state.session.take() {
                    session.release(self.visualizer.as_ref()).await;
                }
                state.current_index = index;
                (state.playlist[index].clone(), state.playlist.len())
            };
            debug!(index, generation, url = %track.url, "Loading track");

            let reachable = match &self.probe {
                Some(probe) => {
                    let probed = tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        reachable = probe.probe(&track.url) => Some(reachable),
                    };
                    match probed {
                        Some(reachable) => reachable,
                        None => return Ok(LoadOutcome::Superseded),
                    }
                }
                None => true,
            };

            if reachable {
                let ended = EndedSignal::new(generation, self.events_tx.clone());
                match self.selector.select(&track, &ended, &token).await {
                    Selection::Ready(backend) => {
                        return self
                            .install(index, generation, backend, &track, &token, autoplay)
                            .await;
                    }
                    Selection::AllFailed(errors) => {
                        warn!(index, url = %track.url, attempts = errors.len(), "Track skipped");
                        self.emit(PlayerStatus::Skipped {
                            index,
                            title: track.display_title().to_string(),
                        });
                    }
                    Selection::Cancelled => return Ok(LoadOutcome::Superseded),
                }
            } else {
                warn!(index, url = %track.url, "Track unreachable, skipped");
                self.emit(PlayerStatus::Unreachable {
                    index,
                    title: track.display_title().to_string(),
                });
            }

            failed.insert(index);
            let next = if failed.len() >= len {
                None
            } else {
                self.skip_from(index, traversal, len, &failed).await
            };
            match next {
                Some(next) => index = next,
                None => {
                    let attempts = failed.len();
                    error!(attempts, "No playable track in the playlist");
                    self.finish_attempt(generation).await;
                    self.emit(PlayerStatus::AllUnplayable { attempts });
                    return Ok(LoadOutcome::AllUnplayable);
                }
            }

            drop(attempt_guard);
        }
    }

    /// Makes `backend` the live session unless its attempt was superseded
    async fn install(
        &self,
        index: usize,
        generation: u64,
        backend: ActiveBackend,
        track: &Track,
        token: &CancellationToken,
        autoplay: bool,
    ) -> Result<LoadOutcome> {
        let mut state = self.state.lock().await;

        if token.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            drop(state);
            debug!(generation, "Dropping superseded backend");
            backend.release().await;
            return Ok(LoadOutcome::Superseded);
        }
        state.attempt = None;

        let kind = backend.kind();
        let title = track.display_title().to_string();
        let mut session =
            PlaybackSession::start(index, generation, backend, self.visualizer.as_ref());

        let playing = if autoplay {
            match self.start_playback(&mut session).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(index, error = %e, "Playback refused, track left paused");
                    false
                }
            }
        } else {
            false
        };
        state.session = Some(session);
        drop(state);

        if playing {
            self.emit(PlayerStatus::Playing {
                index,
                title,
                backend: kind,
            });
        } else {
            self.emit(PlayerStatus::Paused { index, title });
        }

        Ok(LoadOutcome::Ready {
            index,
            backend: kind,
            playing,
        })
    }

    /// Forgets the attempt token if no newer attempt replaced it
    async fn finish_attempt(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            state.attempt = None;
        }
    }
}

fn title_at(playlist: &Playlist, index: usize) -> String {
    playlist
        .get(index)
        .map(|t| t.display_title().to_string())
        .unwrap_or_default()
}

/// Builder for [`Player`]
pub struct PlayerBuilder {
    platform: Arc<dyn AudioPlatform>,
    visualizer: Arc<dyn VisualizerSink>,
    backends: Vec<BackendKind>,
    strategies: Option<Vec<Arc<dyn PlaybackStrategy>>>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    http_probe: bool,
    attempt_timeout: Duration,
    http_client: Option<Client>,
    http_timeout: Duration,
    user_agent: String,
    seed: Option<u64>,
}

impl PlayerBuilder {
    pub fn new(platform: Arc<dyn AudioPlatform>) -> Self {
        Self {
            platform,
            visualizer: Arc::new(NoVisualizer),
            backends: BackendKind::DEFAULT_ORDER.to_vec(),
            strategies: None,
            probe: None,
            http_probe: false,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            http_client: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            seed: None,
        }
    }

    pub fn visualizer(mut self, visualizer: Arc<dyn VisualizerSink>) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Fallback order of the built-in strategies
    pub fn backends(mut self, backends: &[BackendKind]) -> Self {
        self.backends = backends.to_vec();
        self
    }

    /// Custom strategy chain, replacing the built-in ones
    pub fn strategies(mut self, strategies: Vec<Arc<dyn PlaybackStrategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Probe tracks with `HEAD` before any backend attempt
    pub fn http_probe(mut self, enabled: bool) -> Self {
        self.http_probe = enabled;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Deterministic random traversal
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn settings(self, settings: &PlayerSettings) -> Self {
        self.backends(&settings.backends)
            .http_probe(settings.probe_enabled)
            .attempt_timeout(settings.attempt_timeout)
            .http_timeout(settings.http_timeout)
            .user_agent(settings.user_agent.clone())
    }

    pub fn build(self) -> Result<Arc<Player>> {
        let PlayerBuilder {
            platform,
            visualizer,
            backends,
            strategies,
            probe,
            http_probe,
            attempt_timeout,
            http_client,
            http_timeout,
            user_agent,
            seed,
        } = self;

        let client = match http_client {
            Some(client) => client,
            None => Client::builder()
                .timeout(http_timeout)
                .user_agent(user_agent)
                .build()?,
        };

        let strategies = strategies
            .unwrap_or_else(|| strategies_for(&backends, platform.clone(), client.clone()));

        let probe = match probe {
            Some(probe) => Some(probe),
            None if http_probe => {
                Some(Arc::new(HttpProbe::new(client.clone())) as Arc<dyn ReachabilityProbe>)
            }
            None => None,
        };

        let random = match seed {
            Some(seed) => RandomSequencer::seeded(seed),
            None => RandomSequencer::new(),
        };

        let selector = BackendSelector::new(strategies, attempt_timeout);
        info!(
            backends = ?selector.kinds(),
            probe = probe.is_some(),
            timeout = ?attempt_timeout,
            "Player created"
        );

        let playlist_client = PlaylistClient::builder()
            .client(client)
            .timeout(http_timeout)
            .build()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Ok(Arc::new(Player {
            platform,
            visualizer,
            selector,
            probe,
            playlist_client,
            generation: AtomicU64::new(0),
            state: Mutex::new(PlayerState {
                playlist: Playlist::empty(),
                current_index: 0,
                session: None,
                attempt: None,
                random,
                closed: false,
            }),
            attempt_lock: Mutex::new(()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            status_tx,
            shutdown: CancellationToken::new(),
        }))
    }
}
