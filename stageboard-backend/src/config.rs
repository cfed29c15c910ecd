/// Configuration for the stageboard host.
/// Reads board.json from ~/.config/stageboard/board.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use stageboard_core::config::EngineConfig;
use stageboard_core::types::BoardKind;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No base_url configured in {0}")]
    MissingBaseUrl(String),

    #[error("Invalid base_url {0:?}: must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub board: BoardKind,
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub notify_transition_success: bool,
}

fn default_persist_timeout_ms() -> u64 {
    EngineConfig::default().persist_timeout_ms
}

fn default_true() -> bool {
    true
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            board: BoardKind::default(),
            persist_timeout_ms: default_persist_timeout_ms(),
            notify_transition_success: true,
        }
    }
}

impl BoardConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            persist_timeout_ms: self.persist_timeout_ms,
            notify_transition_success: self.notify_transition_success,
        }
    }

    /// Root URL of the configured board's routes, e.g. `https://api.example/leads`.
    pub fn board_url(&self, path: &Path) -> Result<String, ConfigError> {
        let base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingBaseUrl(path.display().to_string()))?;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base.to_string()));
        }
        let board = match self.board {
            BoardKind::Leads => "leads",
            BoardKind::Tickets => "tickets",
        };
        Ok(format!("{}/{}", base.trim_end_matches('/'), board))
    }

    /// Token with surrounding whitespace removed; blank means none.
    pub fn api_token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Default config path: ~/.config/stageboard/board.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stageboard")
        .join("board.json")
}

/// Load config from path. Returns default if file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> BoardConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[stageboard.config.load] Failed to parse config {}: {}",
                path.display(),
                e
            );
            BoardConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[stageboard.config.load] No config at {}, using defaults",
                path.display()
            );
            BoardConfig::default()
        }
    }
}

/// Write config, creating parent directories.
pub fn save_config(path: &Path, config: &BoardConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    let write_err = |source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, content).map_err(write_err)
}
