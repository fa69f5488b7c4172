use super::{ActiveBackend, AudioPlatform, BackendKind, EndedSignal, PlaybackStrategy};
use crate::error::BackendError;
use async_trait::async_trait;
use brspplaylist::Track;
use std::sync::Arc;
use tracing::debug;

/// Whole-resource decode through the platform's buffered mode
pub struct BufferedStrategy {
    platform: Arc<dyn AudioPlatform>,
}

impl BufferedStrategy {
    pub fn new(platform: Arc<dyn AudioPlatform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PlaybackStrategy for BufferedStrategy {
    fn kind(&self) -> BackendKind {
        BackendKind::Buffered
    }

    async fn open(&self, track: &Track, ended: EndedSignal) -> Result<ActiveBackend, BackendError> {
        debug!(url = %track.url, "Opening buffered decode");
        let handle = self.platform.open_buffered(&track.url, ended).await?;
        Ok(ActiveBackend::Buffered(handle))
    }
}
