//! Front-end video settings consumed by the resource wrappers
//!
//! Stored as JSON next to the rest of the front-end settings. Every field has a
//! default so partial or older files still load.

use serde::{Deserialize, Serialize};

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    /// Sharp pixels (default for emulated output)
    #[default]
    Nearest,
    Linear,
}

impl TextureFilter {
    pub fn from_linear(linear: bool) -> Self {
        if linear {
            TextureFilter::Linear
        } else {
            TextureFilter::Nearest
        }
    }

    /// The GL enum for MIN/MAG filter parameters
    pub fn gl_enum(self) -> u32 {
        match self {
            TextureFilter::Nearest => glow::NEAREST,
            TextureFilter::Linear => glow::LINEAR,
        }
    }
}

/// Extra attachments for an offscreen framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FramebufferOptions {
    #[serde(default)]
    pub depth: bool,
    /// Only honoured together with `depth`
    #[serde(default)]
    pub stencil: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub filter: TextureFilter,
    #[serde(default)]
    pub framebuffer: FramebufferOptions,
}

impl VideoConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_nearest_without_depth() {
        let config = VideoConfig::default();
        assert_eq!(config.filter, TextureFilter::Nearest);
        assert!(!config.framebuffer.depth);
        assert!(!config.framebuffer.stencil);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = VideoConfig::from_json(r#"{ "filter": "linear" }"#).unwrap();
        assert_eq!(config.filter, TextureFilter::Linear);
        assert_eq!(config.framebuffer, FramebufferOptions::default());
    }

    #[test]
    fn test_empty_object_loads() {
        let config = VideoConfig::from_json("{}").unwrap();
        assert_eq!(config, VideoConfig::default());
    }

    #[test]
    fn test_saved_settings_load_back() {
        let config = VideoConfig {
            filter: TextureFilter::Linear,
            framebuffer: FramebufferOptions {
                depth: true,
                stencil: true,
            },
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"linear\""));
        assert_eq!(VideoConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        assert!(VideoConfig::from_json(r#"{ "filter": "bicubic" }"#).is_err());
    }

    #[test]
    fn test_filter_gl_enum() {
        assert_eq!(TextureFilter::Nearest.gl_enum(), glow::NEAREST);
        assert_eq!(TextureFilter::Linear.gl_enum(), glow::LINEAR);
        assert_eq!(TextureFilter::from_linear(true), TextureFilter::Linear);
    }
}
