//! Backend configuration (glaze.toml)

use crate::error::{RenderError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables and capability flags for one render thread
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Hardware accepts non-power-of-two texture sizes
    #[serde(default)]
    pub npot_textures: bool,
    /// Released off-screen buffers kept for reuse
    #[serde(default = "default_pool_capacity")]
    pub offscreen_pool_capacity: usize,
    /// Font strikes kept by the glyph cache
    #[serde(default = "default_glyph_capacity")]
    pub glyph_cache_capacity: usize,
    /// Sweep dead texture entries after every insertion
    #[serde(default = "default_true")]
    pub cleanup_after_insert: bool,
    /// Curve flattening tolerance in device pixels
    #[serde(default = "default_tolerance")]
    pub tessellation_tolerance: f32,
    /// Rasterize glyphs with antialiased coverage
    #[serde(default = "default_true")]
    pub text_antialiasing: bool,
}

fn default_pool_capacity() -> usize {
    10
}

fn default_glyph_capacity() -> usize {
    32
}

fn default_true() -> bool {
    true
}

fn default_tolerance() -> f32 {
    0.1
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            npot_textures: false,
            offscreen_pool_capacity: default_pool_capacity(),
            glyph_cache_capacity: default_glyph_capacity(),
            cleanup_after_insert: true,
            tessellation_tolerance: default_tolerance(),
            text_antialiasing: true,
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RenderError::Config(e.to_string()))
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RenderError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RenderError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = RenderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.offscreen_pool_capacity, 10);
        assert!(!config.npot_textures);
    }

    #[test]
    fn test_partial_override() {
        let config = RenderConfig::from_toml_str("npot_textures = true\nglyph_cache_capacity = 4\n").unwrap();
        assert!(config.npot_textures);
        assert_eq!(config.glyph_cache_capacity, 4);
        assert!(config.cleanup_after_insert);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = RenderConfig {
            tessellation_tolerance: 0.25,
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(RenderConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = RenderConfig::from_toml_str("npot_textures = 3").unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
    }
}
