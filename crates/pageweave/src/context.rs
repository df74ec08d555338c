//! Global context for CLI commands

use anyhow::{Context as _, Result, anyhow};
use pageweave_core::config::consts::CONFIG_FILE_NAME;
use pageweave_core::{Config, PageweaveError, ViewEngine};
use std::env;
use std::path::PathBuf;

/// Project root, its configuration and global flags
pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub verbose: bool,
}

impl AppContext {
    /// Load the project at `root`, or the one containing the current directory
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No `root` is given and no pageweave.toml is found upward
    /// - pageweave.toml cannot be read, parsed or validated
    pub fn new(root: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let (root, config) = match root {
            Some(root) => {
                let config_path = root.join(CONFIG_FILE_NAME);
                let config = if config_path.is_file() {
                    Config::from_file(&config_path)?
                } else {
                    Config::default()
                };
                (root, config)
            }
            None => {
                let current_dir = env::current_dir()?;
                Config::discover(&current_dir).map_err(|e| match e {
                    PageweaveError::ConfigNotFound => {
                        anyhow!("Not in a pageweave project (no {} found); use --root", CONFIG_FILE_NAME)
                    }
                    other => other.into(),
                })?
            }
        };

        Ok(Self { root, config, verbose })
    }

    /// View engine over the project's template root
    pub fn engine(&self) -> Result<ViewEngine> {
        ViewEngine::from_config(&self.config, &self.root)
            .with_context(|| format!("Failed to open templates in {}", self.root.display()))
    }
}
