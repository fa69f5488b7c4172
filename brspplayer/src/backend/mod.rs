//! Playback backends
//!
//! A backend is one way of turning a track URL into something the native
//! audio layer can play:
//!
//! | Kind | Mechanism |
//! |------|-----------|
//! | [`BackendKind::Buffered`] | decode the whole resource in memory |
//! | [`BackendKind::Streaming`] | hand the URL to a streaming media element |
//! | [`BackendKind::Blob`] | download the bytes ourselves, then stream a local copy |
//!
//! The native layer itself is the [`AudioPlatform`] collaborator. Each
//! backend is driven through a [`PlaybackStrategy`] which produces an
//! [`ActiveBackend`]; the selector tries them in order.

mod blob;
mod buffered;
mod streaming;

pub use blob::{BlobResource, BlobStrategy};
pub use buffered::BufferedStrategy;
pub use streaming::StreamingStrategy;

use crate::error::BackendError;
use async_trait::async_trait;
use brspplaylist::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Backend variants, in their default fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Buffered,
    Streaming,
    Blob,
}

impl BackendKind {
    /// Default fallback chain, cheapest first
    pub const DEFAULT_ORDER: [BackendKind; 3] = [
        BackendKind::Buffered,
        BackendKind::Streaming,
        BackendKind::Blob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Buffered => "buffered",
            BackendKind::Streaming => "streaming",
            BackendKind::Blob => "blob",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" | "webaudio" => Ok(BackendKind::Buffered),
            "streaming" | "html5" => Ok(BackendKind::Streaming),
            "blob" => Ok(BackendKind::Blob),
            other => Err(format!("Unknown backend '{}'", other)),
        }
    }
}

/// Opaque identifier of the audio-graph node a handle outputs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputNode(pub u64);

/// Notifications flowing from the native layer back to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The handle opened for `generation` reached the end of its track
    Ended { generation: u64 },
}

/// Callback handed to the native layer when a handle is opened
///
/// Firing it after the player moved on is harmless: the generation no longer
/// matches the live session and the event is dropped.
#[derive(Debug, Clone)]
pub struct EndedSignal {
    generation: u64,
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl EndedSignal {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report the end of the track
    pub fn fire(&self) {
        let _ = self.tx.send(PlayerEvent::Ended {
            generation: self.generation,
        });
    }
}

/// A native playback handle (decoded sound or media element)
#[async_trait]
pub trait AudioHandle: Send + Sync {
    /// Resolves once the resource is loaded (load-complete / can-play)
    /// or fails with the backend's error event.
    async fn ready(&mut self) -> Result<(), BackendError>;

    async fn play(&mut self) -> Result<(), BackendError>;

    async fn pause(&mut self) -> Result<(), BackendError>;

    /// Halt playback and rewind. Defaults to a pause.
    async fn stop(&mut self) -> Result<(), BackendError> {
        self.pause().await
    }

    /// Stop playback and free native resources. Must be idempotent.
    async fn release(&mut self);

    /// Node feeding the visualizer
    fn output(&self) -> OutputNode;
}

/// The native audio layer
#[async_trait]
pub trait AudioPlatform: Send + Sync {
    /// Create a handle decoding the whole resource in memory
    async fn open_buffered(
        &self,
        url: &str,
        ended: EndedSignal,
    ) -> Result<Box<dyn AudioHandle>, BackendError>;

    /// Create a streaming media element pointed at `src`
    async fn open_element(
        &self,
        src: &str,
        ended: EndedSignal,
    ) -> Result<Box<dyn AudioHandle>, BackendError>;

    /// Whether the output context waits for a user gesture
    fn output_suspended(&self) -> bool {
        false
    }

    async fn resume_output(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Receives the output node of every new session
pub trait VisualizerSink: Send + Sync {
    fn connect(&self, node: &OutputNode);

    fn disconnect(&self, _node: &OutputNode) {}
}

/// Visualizer that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVisualizer;

impl VisualizerSink for NoVisualizer {
    fn connect(&self, _node: &OutputNode) {}
}

/// One step of the fallback chain
#[async_trait]
pub trait PlaybackStrategy: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Acquire the backend for `track`. Readiness is awaited by the caller,
    /// which also releases the backend if it never becomes ready.
    async fn open(&self, track: &Track, ended: EndedSignal)
        -> Result<ActiveBackend, BackendError>;
}

/// The backend owning the current handle
///
/// Exactly one handle exists per value, so two backends can never be live
/// at the same time for one session.
pub enum ActiveBackend {
    Buffered(Box<dyn AudioHandle>),
    Streaming(Box<dyn AudioHandle>),
    Blob {
        handle: Box<dyn AudioHandle>,
        blob: BlobResource,
    },
}

impl fmt::Debug for ActiveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveBackend::Blob { blob, .. } => f
                .debug_struct("Blob")
                .field("object_url", &blob.object_url())
                .finish(),
            other => f.debug_tuple(other.kind().as_str()).finish(),
        }
    }
}

impl ActiveBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            ActiveBackend::Buffered(_) => BackendKind::Buffered,
            ActiveBackend::Streaming(_) => BackendKind::Streaming,
            ActiveBackend::Blob { .. } => BackendKind::Blob,
        }
    }

    fn handle(&self) -> &dyn AudioHandle {
        match self {
            ActiveBackend::Buffered(handle)
            | ActiveBackend::Streaming(handle)
            | ActiveBackend::Blob { handle, .. } => &**handle,
        }
    }

    fn handle_mut(&mut self) -> &mut dyn AudioHandle {
        match self {
            ActiveBackend::Buffered(handle)
            | ActiveBackend::Streaming(handle)
            | ActiveBackend::Blob { handle, .. } => &mut **handle,
        }
    }

    pub async fn ready(&mut self) -> Result<(), BackendError> {
        self.handle_mut().ready().await
    }

    pub async fn play(&mut self) -> Result<(), BackendError> {
        self.handle_mut().play().await
    }

    pub async fn pause(&mut self) -> Result<(), BackendError> {
        self.handle_mut().pause().await
    }

    pub async fn stop(&mut self) -> Result<(), BackendError> {
        self.handle_mut().stop().await
    }

    pub fn output(&self) -> OutputNode {
        self.handle().output()
    }

    /// Stop, unload and revoke any temporary object URL
    pub async fn release(self) {
        match self {
            ActiveBackend::Buffered(mut handle) | ActiveBackend::Streaming(mut handle) => {
                handle.release().await;
            }
            ActiveBackend::Blob { mut handle, blob } => {
                handle.release().await;
                blob.revoke();
            }
        }
    }
}

/// Builds the strategy chain for `kinds`, in order
///
/// Duplicate kinds are kept once, at their first position.
pub fn strategies_for(
    kinds: &[BackendKind],
    platform: Arc<dyn AudioPlatform>,
    client: reqwest::Client,
) -> Vec<Arc<dyn PlaybackStrategy>> {
    let mut seen = Vec::new();
    let mut strategies: Vec<Arc<dyn PlaybackStrategy>> = Vec::new();

    for kind in kinds {
        if seen.contains(kind) {
            continue;
        }
        seen.push(*kind);

        strategies.push(match kind {
            BackendKind::Buffered => Arc::new(BufferedStrategy::new(platform.clone())),
            BackendKind::Streaming => Arc::new(StreamingStrategy::new(platform.clone())),
            BackendKind::Blob => Arc::new(BlobStrategy::new(platform.clone(), client.clone())),
        });
    }

    strategies
}
