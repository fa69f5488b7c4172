//! Track and Playlist: the immutable data the widget plays from

use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// One entry of the playlist document
///
/// Identity is the position in the [`Playlist`], not the URL: two entries may
/// share a URL and are still distinct tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Title to show in the UI; falls back to the last URL segment
    pub fn display_title(&self) -> &str {
        if !self.title.trim().is_empty() {
            return &self.title;
        }
        self.url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.url)
    }
}

/// Ordered, immutable sequence of tracks
///
/// Cloning is cheap: the tracks are shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    tracks: Arc<[Track]>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

impl Index<usize> for Playlist {
    type Output = Track;

    fn index(&self, index: usize) -> &Track {
        &self.tracks[index]
    }
}

impl From<Vec<Track>> for Playlist {
    fn from(tracks: Vec<Track>) -> Self {
        Self::new(tracks)
    }
}

impl FromIterator<Track> for Playlist {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Playlist {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}
