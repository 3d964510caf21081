// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section and field is optional; anything missing takes the default.
// A missing or unreadable file means all defaults.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::render::DEFAULT_CLEAR_COLOR;
use crate::backend::{RenderSettings, ShaderPaths, Validation};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub shaders: ShadersConfig,
    pub scene: SceneConfig,
}

/// Window settings. A zero width or height means half the monitor, centred.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Canvas Renderer".to_string(),
            width: 0,
            height: 0,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "mailbox".to_string(),
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// On in debug builds, off in release builds
    #[default]
    Auto,
    Enabled,
    Disabled,
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation: ValidationMode,
    pub log_level: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation: ValidationMode::Auto,
            log_level: "info".to_string(),
            show_fps: true,
        }
    }
}

/// Compiled SPIR-V shader paths
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShadersConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShadersConfig {
    fn default() -> Self {
        let paths = ShaderPaths::default();
        Self {
            vertex: paths.vertex,
            fragment: paths.fragment,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SceneConfig {
    pub sierpinski_depth: u32,
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Preferred present mode. Unknown names fall back to FIFO, which every
    /// surface supports.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                vk::PresentModeKHR::FIFO
            }
        }
    }

    pub fn validation(&self) -> Validation {
        let enabled = match self.debug.validation {
            ValidationMode::Auto => cfg!(debug_assertions),
            ValidationMode::Enabled => true,
            ValidationMode::Disabled => false,
        };
        if enabled {
            Validation::Enabled
        } else {
            Validation::Disabled
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level '{}', using info", self.debug.log_level);
            log::LevelFilter::Info
        })
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            clear_color: self.graphics.clear_color,
            present_mode: self.present_mode(),
        }
    }

    pub fn shader_paths(&self) -> ShaderPaths {
        ShaderPaths {
            vertex: self.shaders.vertex.clone(),
            fragment: self.shaders.fragment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.window.width, 0);
        assert_eq!(config.window.height, 0);
        assert_eq!(config.graphics.clear_color, [0.17, 0.17, 0.17, 1.0]);
        assert_eq!(config.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.debug.validation, ValidationMode::Auto);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/shader.vert.spv"));
        assert_eq!(config.shaders.fragment, PathBuf::from("shaders/shader.frag.spv"));
        assert_eq!(config.scene.sierpinski_depth, 0);
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            title = "Triangles"
            width = 800

            [graphics]
            present_mode = "fifo"

            [scene]
            sierpinski_depth = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Triangles");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 0);
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(config.graphics.clear_color, DEFAULT_CLEAR_COLOR);
        assert_eq!(config.scene.sierpinski_depth, 4);
    }

    #[test]
    fn validation_modes() {
        let enabled = Config::parse("[debug]\nvalidation = \"enabled\"").unwrap();
        assert_eq!(enabled.validation(), Validation::Enabled);

        let disabled = Config::parse("[debug]\nvalidation = \"disabled\"").unwrap();
        assert_eq!(disabled.validation(), Validation::Disabled);

        let auto = Config::default();
        let expected = if cfg!(debug_assertions) {
            Validation::Enabled
        } else {
            Validation::Disabled
        };
        assert_eq!(auto.validation(), expected);
    }

    #[test]
    fn unknown_validation_mode_is_a_parse_error() {
        assert!(Config::parse("[debug]\nvalidation = \"sometimes\"").is_err());
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = Config::parse("[graphics]\npresent_mode = \"triple\"").unwrap();
        assert_eq!(config.present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn render_settings_carry_clear_color() {
        let config = Config::parse("[graphics]\nclear_color = [0.0, 0.5, 1.0, 1.0]").unwrap();
        let settings = config.render_settings();
        assert_eq!(settings.clear_color, [0.0, 0.5, 1.0, 1.0]);
        assert_eq!(settings.present_mode, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let config = Config::parse("[debug]\nlog_level = \"loud\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Info);

        let config = Config::parse("[debug]\nlog_level = \"trace\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Trace);
    }

    #[test]
    fn malformed_file_is_an_error_not_defaults() {
        let path = std::env::temp_dir().join(format!("canvas-renderer-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = \"wide\"\n").unwrap();

        let result = Config::load_from_path(&path);
        std::fs::remove_file(&path).unwrap();

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to parse config file"), "{}", message);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.window.title, "Canvas Renderer");
    }
}
