//! # brspplaylist
//!
//! Playlist side of the BRSP widget:
//!
//! - [`Track`] / [`Playlist`]: the immutable list loaded once at startup
//! - [`PlaylistClient`]: `GET` of the JSON playlist document
//! - [`sequencer`]: next/previous stepping and non-repeating random selection
//!
//! ```no_run
//! use brspplaylist::{sequencer, Direction, PlaylistClient, RandomSequencer};
//!
//! # async fn demo() -> brspplaylist::Result<()> {
//! let playlist = PlaylistClient::new()?
//!     .fetch("https://example.com/playlist.json")
//!     .await?;
//!
//! let after_first = sequencer::next(0, Direction::Forward, playlist.len());
//! let mut random = RandomSequencer::new();
//! let surprise = random.random_next(playlist.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod sequencer;
pub mod track;

pub use client::{ClientBuilder, PlaylistClient};
pub use error::{Error, Result};
pub use sequencer::{Direction, PlayHistory, RandomSequencer};
pub use track::{Playlist, Track};
