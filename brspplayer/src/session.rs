use crate::backend::{ActiveBackend, BackendKind, OutputNode, VisualizerSink};
use crate::error::BackendError;
use tracing::{debug, info};
use uuid::Uuid;

/// The live pairing of a track index with its backend
///
/// The visualizer is wired once, in [`PlaybackSession::start`]; `play()` never
/// touches the audio graph.
#[derive(Debug)]
pub struct PlaybackSession {
    id: Uuid,
    track_index: usize,
    generation: u64,
    backend: ActiveBackend,
    output: OutputNode,
    is_playing: bool,
}

impl PlaybackSession {
    pub fn start(
        track_index: usize,
        generation: u64,
        backend: ActiveBackend,
        visualizer: &dyn VisualizerSink,
    ) -> Self {
        let output = backend.output();
        visualizer.connect(&output);

        let id = Uuid::new_v4();
        info!(session = %id, track_index, backend = %backend.kind(), "Session started");

        Self {
            id,
            track_index,
            generation,
            backend,
            output,
            is_playing: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn output(&self) -> &OutputNode {
        &self.output
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// No-op when already playing
    pub async fn play(&mut self) -> Result<(), BackendError> {
        if self.is_playing {
            return Ok(());
        }
        self.backend.play().await?;
        self.is_playing = true;
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), BackendError> {
        if !self.is_playing {
            return Ok(());
        }
        self.backend.pause().await?;
        self.is_playing = false;
        Ok(())
    }

    /// The backend reached the end of the track on its own
    pub fn mark_ended(&mut self) {
        self.is_playing = false;
    }

    /// Stop playback, unwire the visualizer and free the backend
    pub async fn release(mut self, visualizer: &dyn VisualizerSink) {
        if let Err(e) = self.backend.stop().await {
            debug!(session = %self.id, error = %e, "Stop before release failed");
        }
        visualizer.disconnect(&self.output);
        self.backend.release().await;
        info!(session = %self.id, track_index = self.track_index, "Session released");
    }
}
