use super::{ActiveBackend, AudioPlatform, BackendKind, EndedSignal, PlaybackStrategy};
use crate::error::BackendError;
use async_trait::async_trait;
use brspplaylist::Track;
use std::sync::Arc;
use tracing::debug;

/// Native streaming element pointed straight at the track URL
pub struct StreamingStrategy {
    platform: Arc<dyn AudioPlatform>,
}

impl StreamingStrategy {
    pub fn new(platform: Arc<dyn AudioPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PlaybackStrategy for StreamingStrategy {
    fn kind(&self) -> BackendKind {
        BackendKind::Streaming
    }

    async fn open(&self, track: &Track, ended: EndedSignal) -> Result<ActiveBackend, BackendError> {
        debug!(url = %track.url, "Attaching streaming element");
        let handle = self.platform.open_element(&track.url, ended).await?;
        Ok(ActiveBackend::Streaming(handle))
    }
}
