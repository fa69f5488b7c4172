//! # BRSP Configuration Module
//!
//! This module provides configuration management for the BRSP playlist widget:
//! - Loading configuration from YAML files
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Typed getters and setters for the widget, HTTP and logger settings
//! - A lazily loaded process-wide instance
//!
//! The persisted collapse flag of the widget lives next to the configuration
//! file, see [`ui_state`].
//!
//! ## Usage
//!
//! ```no_run
//! use brspconfig::get_config;
//!
//! let config = get_config();
//!
//! let url = config.get_playlist_url();
//! let timeout = config.get_load_timeout_secs()?;
//!
//! config.set_probe_enabled(true)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::info;

pub mod ui_state;

pub use ui_state::{UiState, COLLAPSED_KEY};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("brspwidget.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load BRSP configuration"));
}

const ENV_CONFIG_DIR: &str = "BRSP_CONFIG";
const ENV_PREFIX: &str = "BRSP_CONFIG__";
const DEFAULT_DIR_NAME: &str = ".brsp";

// Default values for configuration
pub const DEFAULT_PLAYLIST_URL: &str = "https://od.lk/s/NV8yMDcxMTc3MzNf/playlist.json";
pub const DEFAULT_BACKENDS: &[&str] = &["buffered", "streaming", "blob"];
const DEFAULT_LOAD_TIMEOUT_SECS: usize = 15;
const DEFAULT_HTTP_TIMEOUT_SECS: usize = 30;
const DEFAULT_USER_AGENT: &str = "BRSP-Widget/0.1 (brspplayer)";
const DEFAULT_PROBE_ENABLED: bool = false;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => Ok(n.as_u64().unwrap_or_default() as usize),
                Ok(Value::Number(n)) if n.is_i64() => {
                    tracing::warn!(path = ?$path, value = %n, "Negative value, using default");
                    Ok($default)
                }
                Ok(other) => {
                    tracing::warn!(path = ?$path, value = ?other, "Not a number, using default");
                    Ok($default)
                }
                Err(_) => Ok($default),
            }
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            let n = Number::from(value);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for the widget
///
/// The YAML document is kept in memory behind a mutex; every setter writes
/// the whole document back to `config.yaml`.
///
/// # Examples
///
/// ```no_run
/// use brspconfig::Config;
///
/// let config = Config::load_config("/tmp/brsp-test")?;
/// println!("Playlist: {}", config.get_playlist_url());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(DEFAULT_DIR_NAME).exists() {
            return DEFAULT_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        DEFAULT_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        // Test read permission
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `BRSP_CONFIG` environment variable
    /// 3. `.brsp` in the current directory
    /// 4. `.brsp` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let mut config_value = Self::lower_keys_value(default_value);

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Un fichier vide se désérialise en Null : on garde alors les défauts
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));

        Self::apply_overrides(&mut config_value, env::vars());

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml` and the persisted UI state
    pub fn directory(&self) -> &Path {
        Path::new(&self.config_dir)
    }

    /// Path of the `config.yaml` file
    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Opens the persisted UI state stored alongside this configuration
    pub fn ui_state(&self) -> UiState {
        UiState::open(self.directory())
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self
            .data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))?;
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["widget", "playlist_url"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self
                .data
                .lock()
                .map_err(|_| anyhow!("Configuration lock poisoned"))?;
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self
            .data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Applies `BRSP_CONFIG__SECTION__KEY=value` pairs onto the document
    fn apply_overrides<I>(config: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!(key = %key, error = %e, "Ignoring environment override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    // ========================================================================
    // Widget
    // ========================================================================

    /// URL of the JSON playlist document
    pub fn get_playlist_url(&self) -> String {
        match self.get_value(&["widget", "playlist_url"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            Ok(other) => {
                tracing::warn!(value = ?other, "Playlist URL is not a string or empty, using default");
                DEFAULT_PLAYLIST_URL.to_string()
            }
            Err(_) => DEFAULT_PLAYLIST_URL.to_string(),
        }
    }

    pub fn set_playlist_url(&self, url: &str) -> Result<()> {
        self.set_value(&["widget", "playlist_url"], Value::String(url.to_string()))
    }

    /// Ordered backend names, as written in the configuration
    ///
    /// Non-string entries are skipped. An absent or empty list yields the
    /// default order.
    pub fn get_backend_names(&self) -> Vec<String> {
        let names: Vec<String> = match self.get_value(&["widget", "backends"]) {
            Ok(Value::Sequence(seq)) => seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_lowercase()),
                    other => {
                        tracing::warn!(value = ?other, "Ignoring non-string backend entry");
                        None
                    }
                })
                .collect(),
            Ok(other) => {
                tracing::warn!(value = ?other, "Backends is not a list, using default order");
                Vec::new()
            }
            Err(_) => Vec::new(),
        };

        if names.is_empty() {
            DEFAULT_BACKENDS.iter().map(|s| s.to_string()).collect()
        } else {
            names
        }
    }

    pub fn set_backend_names(&self, names: &[&str]) -> Result<()> {
        let seq = names
            .iter()
            .map(|n| Value::String(n.to_string()))
            .collect();
        self.set_value(&["widget", "backends"], Value::Sequence(seq))
    }

    impl_bool_config!(
        get_probe_enabled,
        set_probe_enabled,
        &["widget", "probe", "enabled"],
        DEFAULT_PROBE_ENABLED
    );

    impl_usize_config!(
        get_load_timeout_secs,
        set_load_timeout_secs,
        &["widget", "load_timeout_secs"],
        DEFAULT_LOAD_TIMEOUT_SECS
    );

    // ========================================================================
    // HTTP
    // ========================================================================

    impl_usize_config!(
        get_http_timeout_secs,
        set_http_timeout_secs,
        &["http", "timeout_secs"],
        DEFAULT_HTTP_TIMEOUT_SECS
    );

    pub fn get_user_agent(&self) -> String {
        match self.get_value(&["http", "user_agent"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => DEFAULT_USER_AGENT.to_string(),
        }
    }

    // ========================================================================
    // Logger
    // ========================================================================

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => s,
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: &str) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level.to_string()))
    }
}

/// Returns the global configuration instance
///
/// The instance is loaded on first access from the directory resolved by
/// [`Config::config_dir`].
///
/// # Panics
///
/// Panics on first access if the configuration directory cannot be created
/// or the YAML cannot be parsed.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default value. A `Null` external document leaves the
/// defaults untouched.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (_, Value::Null) => {}
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
