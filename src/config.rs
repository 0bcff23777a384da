use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::spectrum::SpectrumMethod;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_target_points")]
    pub target_points: usize,
    #[serde(default = "default_bar_count")]
    pub bar_count: usize,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default)]
    pub method: SpectrumMethod,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_seconds")]
    pub seconds: f64,
    #[serde(default)]
    pub track_playback: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_points: default_target_points(),
            bar_count: default_bar_count(),
            window_size: default_window_size(),
            method: SpectrumMethod::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            seconds: default_seconds(),
            track_playback: false,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_target_points() -> usize { 200 }
fn default_bar_count() -> usize { 32 }
fn default_window_size() -> usize { 256 }
fn default_fps() -> u32 { 30 }
fn default_seconds() -> f64 { 2.0 }
fn default_width() -> usize { 64 }
fn default_height() -> usize { 12 }

/// Read and parse a config file. The caller decides how to report failure.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// `./wavescope.toml`, then `~/.config/wavescope/config.toml`, then the
/// platform config directory.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("wavescope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("wavescope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("wavescope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
