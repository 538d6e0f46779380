use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
use crate::terminal::color::ColorConfig;
use crate::terminal::cursor::CursorStyle;
use crate::url::UrlAction;

/// Squall configuration, loaded from ~/.config/squall/config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SquallConfig {
    pub colors: ColorConfig,
    pub terminal: TerminalConfig,
    pub url: UrlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub scrollback_lines: usize,
    pub cursor_style: CursorStyle,
    /// Render worker threads; 0 renders rows inline on the main
    /// thread.
    pub render_workers: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            scrollback_lines: 10_000,
            cursor_style: CursorStyle::Block,
            render_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    /// Command template for launching URLs; `{url}` expands to the
    /// URL text.
    pub launch: Vec<String>,
    pub action: UrlAction,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            launch: vec!["xdg-open".to_string(), "{url}".to_string()],
            action: UrlAction::Launch,
        }
    }
}

impl SquallConfig {
    /// Load config from the standard config path. Errors surface here,
    /// before any rendering starts.
    pub fn load() -> Result<Self, Error> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(Error::ConfigIo)?;
        serde_json::from_str(&content).map_err(Error::ConfigParse)
    }

    /// Load config, falling back to defaults with a logged warning.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("failed to load config: {e}");
                Self::default()
            }
        }
    }

    /// Save config to the standard config path.
    pub fn save(&self) -> Result<(), Error> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::ConfigIo)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(Error::ConfigParse)?;
        std::fs::write(path, content).map_err(Error::ConfigIo)
    }
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("squall")
        .join("config.json")
}
