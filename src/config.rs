//! Configuration persistence for engine settings

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::annotations::Tool;
use crate::annotations::model::DEFAULT_HISTORY_LIMIT;
use crate::domain::{Color, Style};
use crate::render::image::RenderOptions;

/// Prompt used when the caller submits an empty analysis prompt
pub const DEFAULT_PROMPT: &str = "Describe the contents of this image in detail. \
     Be specific about objects, people, colors, and activities you see.";

/// Engine configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tool active when a session starts
    pub default_tool: Tool,
    /// Color for new annotations
    pub default_color: Color,
    /// Stroke width for new annotations, in image pixels
    pub default_stroke_width: f32,
    /// Largest on-screen canvas; images are scaled down to fit
    pub display_max_width: f32,
    pub display_max_height: f32,
    /// Number of undo steps kept
    pub history_limit: usize,
    /// Scale factor for the 8x8 label font
    pub text_scale: u32,
    /// Where callout labels sit relative to the clicked point
    pub callout_offset: (f32, f32),
    /// Prompt sent along with the export when none is given
    pub default_prompt: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_tool: Tool::Rectangle,
            // Red, matching the usual markup color
            default_color: Color::rgb(229, 26, 26),
            default_stroke_width: 3.0,
            display_max_width: 800.0,
            display_max_height: 600.0,
            history_limit: DEFAULT_HISTORY_LIMIT,
            text_scale: 3,
            callout_offset: (24.0, -40.0),
            default_prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Directory name under the platform config dir
    pub const APP_DIR: &'static str = "photo-annotate";

    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::APP_DIR).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            log::warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Save configuration to disk
    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            log::error!("No config directory available for saving");
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::error!("Failed to save config: {:?}", err);
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Style applied to new annotations
    pub fn default_style(&self) -> Style {
        Style {
            color: self.default_color,
            stroke_width: self.default_stroke_width,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            text_scale: self.text_scale,
        }
    }

    /// Replace out-of-range values with their defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.default_stroke_width.is_finite() && self.default_stroke_width > 0.0) {
            log::warn!(
                "Invalid stroke width {} in config, using {}",
                self.default_stroke_width,
                defaults.default_stroke_width
            );
            self.default_stroke_width = defaults.default_stroke_width;
        }
        if !(self.display_max_width > 0.0 && self.display_max_height > 0.0) {
            log::warn!("Invalid display box in config, using defaults");
            self.display_max_width = defaults.display_max_width;
            self.display_max_height = defaults.display_max_height;
        }
        self.history_limit = self.history_limit.max(1);
        self.text_scale = self.text_scale.clamp(1, 16);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig {
            default_tool: Tool::Arrow,
            default_color: Color::rgb(0, 128, 255),
            history_limit: 20,
            ..EngineConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r##"{"default_color": "#00ff00", "text_scale": 0}"##).unwrap();
        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.default_color, Color::rgb(0, 255, 0));
        assert_eq!(config.text_scale, 1);
        assert_eq!(config.default_stroke_width, 3.0);
        assert_eq!(config.default_prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_invalid_values_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"default_stroke_width": -2.0, "display_max_width": 0.0, "history_limit": 0}"#,
        )
        .unwrap();
        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.default_stroke_width, 3.0);
        assert_eq!(config.display_max_width, 800.0);
        assert_eq!(config.history_limit, 1);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(EngineConfig::load_from(&path).is_err());
    }
}
