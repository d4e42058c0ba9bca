//! Configuration for jqq.
//!
//! The configuration file is located at `~/.jqq/config.toml`:
//!
//! ```toml
//! # Evaluator program and extra leading arguments
//! evaluator = "jq"
//! evaluator_args = ["-S"]
//!
//! # Output line cap (defaults to the terminal height)
//! max_lines = 200
//!
//! # Log filter used when JQQ_LOG is not set
//! log_level = "info"
//!
//! [colors]
//! title_fg = { r = 255, g = 255, b = 255 }
//! title_bg = { r = 40, g = 40, b = 120 }
//! error_fg = { r = 220, g = 80, b = 80 }
//! ```
//!
//! A missing file means defaults.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ui::ScreenColors;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Evaluator program
    pub evaluator: String,
    /// Arguments placed before the expression and document
    pub evaluator_args: Vec<String>,
    /// Output line cap, terminal height when unset
    pub max_lines: Option<usize>,
    /// Log filter directive
    pub log_level: String,
    pub colors: ColorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            evaluator: "jq".to_string(),
            evaluator_args: Vec::new(),
            max_lines: None,
            log_level: "info".to_string(),
            colors: ColorConfig::default(),
        }
    }
}

/// Optional colors; unset entries use the terminal's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub title_fg: Option<Color>,
    pub title_bg: Option<Color>,
    pub error_fg: Option<Color>,
}

impl ColorConfig {
    pub fn to_screen_colors(&self) -> ScreenColors {
        ScreenColors {
            title_fg: self.title_fg.map(|c| c.to_crossterm()),
            title_bg: self.title_bg.map(|c| c.to_crossterm()),
            error_fg: self.error_fg.map(|c| c.to_crossterm()),
        }
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

impl Config {
    /// Load configuration from file. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Get config file path
    pub fn config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }
}

/// `~/.jqq`, holding the config file and the log
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".jqq"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
