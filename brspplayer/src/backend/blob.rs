//! Fetched-blob backend
//!
//! Some hosts reject the range / cross-origin request pattern of a streaming
//! element but answer a plain `GET`. This backend downloads the whole
//! resource into a spool file, exposes it through a local `file://` object
//! URL and points a streaming element at that URL.

use super::{ActiveBackend, AudioPlatform, BackendKind, EndedSignal, PlaybackStrategy};
use crate::error::BackendError;
use async_trait::async_trait;
use brspplaylist::Track;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

/// Downloaded copy of a track, alive until revoked
///
/// Dropping the value also deletes the spool file.
#[derive(Debug)]
pub struct BlobResource {
    file: NamedTempFile,
    object_url: String,
    size: u64,
}

impl BlobResource {
    /// Download `url` into a spool file under `spool_dir` (system temp dir if `None`)
    pub async fn download(
        client: &Client,
        url: &str,
        spool_dir: Option<&Path>,
    ) -> Result<Self, BackendError> {
        let mut response = client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("brsp-blob-");
        let suffix = extension_of(url).map(|ext| format!(".{}", ext));
        if let Some(suffix) = &suffix {
            builder.suffix(suffix);
        }
        let file = match spool_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        // Écriture asynchrone sur un second descripteur du même fichier
        let mut writer = tokio::fs::File::from_std(file.reopen()?);
        let mut size = 0u64;
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        writer.flush().await?;
        drop(writer);

        let object_url = Url::from_file_path(file.path())
            .map_err(|_| {
                BackendError::platform(format!(
                    "Cannot build object URL for {}",
                    file.path().display()
                ))
            })?
            .to_string();

        debug!(url, object_url = %object_url, size, "Blob downloaded");
        Ok(Self {
            file,
            object_url,
            size,
        })
    }

    /// Local URL to feed to the streaming element
    pub fn object_url(&self) -> &str {
        &self.object_url
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the spool file; the object URL becomes dangling
    pub fn revoke(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove blob spool file");
        } else {
            debug!(path = %path.display(), "Blob revoked");
        }
    }
}

/// File extension of the URL path, used to keep a meaningful suffix
fn extension_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Download then stream the local copy
pub struct BlobStrategy {
    platform: Arc<dyn AudioPlatform>,
    client: Client,
    spool_dir: Option<PathBuf>,
}

impl BlobStrategy {
    pub fn new(platform: Arc<dyn AudioPlatform>, client: Client) -> Self {
        Self {
            platform,
            client,
            spool_dir: None,
        }
    }

    /// Keep spool files in `dir` instead of the system temp directory
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl PlaybackStrategy for BlobStrategy {
    fn kind(&self) -> BackendKind {
        BackendKind::Blob
    }

    async fn open(&self, track: &Track, ended: EndedSignal) -> Result<ActiveBackend, BackendError> {
        let blob =
            BlobResource::download(&self.client, &track.url, self.spool_dir.as_deref()).await?;

        match self.platform.open_element(blob.object_url(), ended).await {
            Ok(handle) => Ok(ActiveBackend::Blob { handle, blob }),
            Err(e) => {
                blob.revoke();
                Err(e)
            }
        }
    }
}
