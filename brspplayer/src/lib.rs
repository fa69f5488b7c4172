//! # brspplayer
//!
//! Playback side of the BRSP widget.
//!
//! ## Architecture
//!
//! ```text
//! Widget ──> Player ──> BackendSelector ──> PlaybackStrategy (buffered | streaming | blob)
//!              │                                    │
//!              │                                    └──> AudioPlatform (native layer)
//!              ├──> ReachabilityProbe (HEAD, optional)
//!              ├──> PlaybackSession ──> VisualizerSink
//!              └──> brspplaylist (fetch + sequencer)
//! ```
//!
//! The native audio layer and the spectrum visualizer are collaborators
//! supplied by the host through [`AudioPlatform`] and [`VisualizerSink`].
//!
//! ## Usage
//!
//! ```no_run
//! use brspconfig::get_config;
//! use brspplayer::{AudioPlatform, NoVisualizer, Widget};
//! use std::sync::Arc;
//!
//! # async fn demo(platform: Arc<dyn AudioPlatform>) -> brspplayer::Result<()> {
//! let config = get_config();
//! brspplayer::logging::init_logging_from_config(&config).ok();
//!
//! let widget = Widget::from_config(&config, platform, Arc::new(NoVisualizer))?;
//! widget.start().await?;
//! widget.press_play().await?;
//! widget.press_next().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config_ext;
pub mod error;
pub mod logging;
pub mod player;
pub mod probe;
pub mod selector;
pub mod session;
pub mod widget;

pub use backend::{
    strategies_for, ActiveBackend, AudioHandle, AudioPlatform, BackendKind, BlobResource,
    BlobStrategy, BufferedStrategy, EndedSignal, NoVisualizer, OutputNode, PlaybackStrategy,
    PlayerEvent, StreamingStrategy, VisualizerSink,
};
pub use config_ext::{PlayerConfigExt, PlayerSettings};
pub use error::{BackendError, PlayerError, Result};
pub use player::{LoadOutcome, Player, PlayerBuilder, PlayerStatus, Traversal};
pub use probe::{HttpProbe, ReachabilityProbe};
pub use selector::{BackendSelector, Selection};
pub use session::PlaybackSession;
pub use widget::Widget;
