//! Persisted widget UI state
//!
//! A tiny key-value store kept as JSON next to `config.yaml`. The widget only
//! stores its collapsed/expanded flag here, under [`COLLAPSED_KEY`]. An
//! absent key means collapsed, and closing the widget removes the key.

use anyhow::Result;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Key of the collapse flag
pub const COLLAPSED_KEY: &str = "brsp-collapsed";

const STATE_FILE: &str = "ui_state.json";

/// File-backed UI state store
#[derive(Debug, Clone)]
pub struct UiState {
    path: PathBuf,
}

impl UiState {
    /// Opens the store located in `directory` (the file is created lazily)
    pub fn open(directory: &Path) -> Self {
        Self {
            path: directory.join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Map<String, Value> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(_) => return Map::new(),
        };

        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!(path = %self.path.display(), value = ?other, "UI state is not an object, ignoring it");
                Map::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt UI state file, ignoring it");
                Map::new()
            }
        }
    }

    fn write(&self, map: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Raw string value stored under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        match self.read().get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read();
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write(&map)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read();
        if map.remove(key).is_some() {
            self.write(&map)?;
        }
        Ok(())
    }

    /// Whether the widget should start collapsed
    ///
    /// Only an explicit `"false"` expands the widget.
    pub fn is_collapsed(&self) -> bool {
        self.get(COLLAPSED_KEY).as_deref() != Some("false")
    }

    pub fn set_collapsed(&self, collapsed: bool) -> Result<()> {
        debug!(collapsed, "Persisting collapse flag");
        self.set(COLLAPSED_KEY, if collapsed { "true" } else { "false" })
    }

    /// Flips the flag and returns the new state
    pub fn toggle_collapsed(&self) -> Result<bool> {
        let collapsed = !self.is_collapsed();
        self.set_collapsed(collapsed)?;
        Ok(collapsed)
    }

    /// Forgets the flag, so the next start is collapsed again
    pub fn clear(&self) -> Result<()> {
        self.remove(COLLAPSED_KEY)
    }
}
