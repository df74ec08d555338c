use super::consts::{self, CONFIG_FILE_NAME};
use crate::error::{PageweaveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// pageweave.toml schema
///
/// Every section is optional; an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub live_reload: LiveReloadConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Template root, relative to the directory holding pageweave.toml
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Extensions tried in order, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// File stems tried for folder-per-view pages
    #[serde(default = "default_index_names")]
    pub index_names: Vec<String>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
            index_names: default_index_names(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(consts::DEFAULT_TEMPLATE_ROOT)
}

fn default_extensions() -> Vec<String> {
    crate::resolve::DEFAULT_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_index_names() -> Vec<String> {
    crate::resolve::DEFAULT_INDEX_NAMES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Stat files on cache hits and reparse when they changed
    #[serde(default)]
    pub revalidate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            revalidate: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
    /// Deepest `foreach`/`if` nesting accepted by the parser
    #[serde(default = "default_max_block_depth")]
    pub max_block_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_include_depth: consts::DEFAULT_MAX_INCLUDE_DEPTH,
            max_block_depth: consts::DEFAULT_MAX_BLOCK_DEPTH,
        }
    }
}

fn default_max_include_depth() -> usize {
    consts::DEFAULT_MAX_INCLUDE_DEPTH
}

fn default_max_block_depth() -> usize {
    consts::DEFAULT_MAX_BLOCK_DEPTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReloadConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Listen address of the event stream server
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Insert the client script into rendered pages
    #[serde(default = "default_true")]
    pub inject_script: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_address(),
            path: default_path(),
            inject_script: true,
            channel_capacity: consts::live_reload::CHANNEL_CAPACITY,
            heartbeat_secs: consts::live_reload::HEARTBEAT_SECS,
        }
    }
}

impl LiveReloadConfig {
    /// URL the browser connects to
    pub fn url(&self) -> String {
        format!("http://{}{}", self.address, self.path)
    }
}

fn default_address() -> String {
    consts::live_reload::ADDRESS.to_string()
}

fn default_path() -> String {
    consts::live_reload::PATH.to_string()
}

fn default_channel_capacity() -> usize {
    consts::live_reload::CHANNEL_CAPACITY
}

fn default_heartbeat_secs() -> u64 {
    consts::live_reload::HEARTBEAT_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_ignore() -> Vec<String> {
    vec![
        "*.tmp".to_string(),
        ".DS_Store".to_string(),
        "*.swp".to_string(),
    ]
}

fn invalid(field: &str, reason: impl Into<String>) -> PageweaveError {
    PageweaveError::ConfigInvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl Config {
    /// Read pageweave.toml
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PageweaveError::ConfigParseError(e.to_string()))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write pageweave.toml
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PageweaveError::ConfigParseError(e.to_string()))?;

        std::fs::write(path.as_ref(), content).map_err(PageweaveError::IoError)?;

        Ok(())
    }

    /// Nearest directory at or above `start` containing pageweave.toml
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE_NAME).is_file())
            .map(Path::to_path_buf)
    }

    /// Load the configuration of the project containing `start`
    ///
    /// Returns the project root alongside the configuration.
    pub fn discover(start: &Path) -> Result<(PathBuf, Self)> {
        let root = Self::find_root(start).ok_or(PageweaveError::ConfigNotFound)?;
        let config = Self::from_file(root.join(CONFIG_FILE_NAME))?;
        Ok((root, config))
    }

    /// Template root resolved against the project root
    pub fn template_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.templates.root)
    }

    /// Reject values that would make the engine unusable
    pub fn validate(&self) -> Result<()> {
        if self.templates.extensions.is_empty() {
            return Err(invalid("templates.extensions", "at least one extension is required"));
        }
        if let Some(ext) = self
            .templates
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']))
        {
            return Err(invalid(
                "templates.extensions",
                format!("'{}' must be a bare extension such as \"php\"", ext),
            ));
        }
        if let Some(name) = self
            .templates
            .index_names
            .iter()
            .find(|name| crate::path::validate_segment(name).is_err())
        {
            return Err(invalid(
                "templates.index_names",
                format!("'{}' is not a plain file stem", name),
            ));
        }
        if self.render.max_include_depth == 0 {
            return Err(invalid("render.max_include_depth", "must be at least 1"));
        }
        if self.render.max_block_depth == 0 {
            return Err(invalid("render.max_block_depth", "must be at least 1"));
        }
        if !self.live_reload.path.starts_with('/') {
            return Err(invalid("live_reload.path", "must start with '/'"));
        }
        if self.live_reload.channel_capacity == 0 {
            return Err(invalid("live_reload.channel_capacity", "must be at least 1"));
        }
        if self.live_reload.heartbeat_secs == 0 {
            return Err(invalid("live_reload.heartbeat_secs", "must be at least 1"));
        }
        if self.watch.debounce_ms == 0 {
            return Err(invalid("watch.debounce_ms", "must be at least 1"));
        }
        Ok(())
    }
}
