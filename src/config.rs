//! Configuration file support for wayctl.
//!
//! Loads settings from ~/.config/wayctl/config.toml if it exists,
//! otherwise uses sensible defaults.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::replay::ReplayOptions;

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub screenshot: ScreenshotConfig,
    pub dropdown: DropdownConfig,
}

/// Session save/restore settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session file location (`~` is expanded)
    pub path: String,
    /// Pause after launching an app before looking for its view
    pub settle_delay_ms: u64,
    /// Pause between view list scans while waiting for a view
    pub poll_interval_ms: u64,
    /// Give up on an app whose view has not appeared after this long
    pub placement_timeout_ms: u64,
}

/// Screenshot settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Directory screenshots are written to
    pub directory: String,
    /// Program used to open finished screenshots
    pub viewer: String,
}

/// Dropdown terminal settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DropdownConfig {
    /// Size of the shown view; 0 leaves the geometry alone
    pub width: i32,
    pub height: i32,
    /// Show the view on every workspace
    pub sticky: bool,
    /// Keep the view above others even when unfocused
    pub always_on_top: bool,
}

impl Config {
    /// Load config from default path (~/.config/wayctl/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wayctl")
            .join("config.toml")
    }

    /// Load config from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }
}

impl SessionConfig {
    /// Session file path with `~` expanded
    pub fn path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).into_owned())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            settle_delay: self.settle_delay(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            placement_timeout: Duration::from_millis(self.placement_timeout_ms),
        }
    }
}

impl ScreenshotConfig {
    /// Screenshot directory with `~` expanded
    pub fn directory(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.directory).into_owned())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: "~/.config/wayfire-session.json".to_string(),
            settle_delay_ms: 1000,
            poll_interval_ms: 250,
            placement_timeout_ms: 10_000,
        }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            directory: "/tmp".to_string(),
            viewer: "xdg-open".to_string(),
        }
    }
}

impl Default for DropdownConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            sticky: true,
            always_on_top: true,
        }
    }
}
