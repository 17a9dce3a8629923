use crate::history::persist::DEFAULT_COLUMN_WIDTH;
use crate::history::service::HistoryOptions;
use crate::history::MAX_HISTORY;
use crate::utils::{expand_tilde, home_dir};
use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_ENV: &str = "MYSH_CONFIG";
const CONFIG_FILE: &str = ".myshrc.toml";
const HISTORY_FILE: &str = "mysh_history";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub history: HistoryConfig,
    pub prompt: PromptConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Defaults to `$HOME/mysh_history`
    pub path: Option<String>,
    pub capacity: usize,
    pub autosave_secs: u64,
    pub column_width: usize,
    pub load_on_startup: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            capacity: MAX_HISTORY,
            autosave_secs: 10,
            column_width: DEFAULT_COLUMN_WIDTH,
            load_on_startup: false,
        }
    }
}

impl HistoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => expand_tilde(path),
            None => home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(HISTORY_FILE),
        }
    }

    pub fn options(&self) -> HistoryOptions {
        HistoryOptions {
            path: self.resolved_path(),
            capacity: self.capacity,
            // A zero interval would spin the autosave thread
            autosave_interval: Duration::from_secs(self.autosave_secs.max(1)),
            column_width: self.column_width,
            load_on_startup: self.load_on_startup,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub symbol: String,
    pub color: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            symbol: " > ".to_string(),
            color: true,
        }
    }
}

pub fn parse_config(content: &str) -> Result<ShellConfig> {
    toml::from_str(content).context("Failed to parse config")
}

/// Picks the config file: the explicit path, then `$MYSH_CONFIG`, then
/// `~/.myshrc.toml`. The flag says whether the file was asked for by name.
fn config_location(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    if let Some(path) = from_env {
        return Some((path, true));
    }
    home.map(|home| (home.join(CONFIG_FILE), false))
}

pub fn load_config(explicit: Option<&Path>) -> Result<ShellConfig> {
    let from_env = env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    load_config_from(config_location(explicit, from_env, home_dir()))
}

fn load_config_from(location: Option<(PathBuf, bool)>) -> Result<ShellConfig> {
    let Some((path, named)) = location else {
        return Ok(ShellConfig::default());
    };
    if !path.exists() {
        if named {
            bail!("Config file not found: {}", path.display());
        }
        debug!("No config at {}, using defaults", path.display());
        return Ok(ShellConfig::default());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config {}", path.display()))
}
