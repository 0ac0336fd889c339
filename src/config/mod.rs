//! Client configuration
//!
//! Mirrors the properties a host hands to a new rendering client: where
//! the view sits on screen, its size, how it is cleared, and who may use
//! the host interface. Loadable from JSON; missing fields take defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::geometry::ViewGeometry;
use crate::security::{AccessLevel, AccessPolicy, DEFAULT_KNOWN_SITES};
use crate::utils::{BridgeError, Result};

/// Placement of the view in the host GUI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiProps {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Default for GuiProps {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: defaults::VIEW_WIDTH,
            height: defaults::VIEW_HEIGHT,
            pixel_ratio: 1.0,
        }
    }
}

/// RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Bytes in the engine's BGRA pixel order
    pub fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, self.a]
    }
}

/// Rendering client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub gui: GuiProps,
    /// Colour the frame is cleared to before the first paint
    pub background: Color,
    /// Clear to fully transparent instead of `background`
    pub transparent_background: bool,
    pub access_level: AccessLevel,
    /// URL prefixes trusted at `AccessLevel::LocalAndKnown`
    pub known_sites: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gui: GuiProps::default(),
            background: Color::WHITE,
            transparent_background: false,
            access_level: AccessLevel::default(),
            known_sites: DEFAULT_KNOWN_SITES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClientConfig {
    /// Set the view size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.gui.width = width;
        self.gui.height = height;
        self
    }

    /// Set the view's screen position
    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.gui.x = x;
        self.gui.y = y;
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.gui.pixel_ratio = ratio;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = level;
        self
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading client configuration from {}", path.display());
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Reject configurations no view can be created from
    pub fn validate(&self) -> Result<()> {
        if self.gui.width == 0 || self.gui.height == 0 {
            return Err(BridgeError::Config(format!(
                "view size {}x{} must be positive",
                self.gui.width, self.gui.height
            )));
        }
        if self.gui.width > defaults::MAX_TEXTURE_DIMENSION
            || self.gui.height > defaults::MAX_TEXTURE_DIMENSION
        {
            return Err(BridgeError::Config(format!(
                "view size {}x{} exceeds {}",
                self.gui.width,
                self.gui.height,
                defaults::MAX_TEXTURE_DIMENSION
            )));
        }
        if !(self.gui.pixel_ratio.is_finite() && self.gui.pixel_ratio > 0.0) {
            return Err(BridgeError::Config(format!(
                "pixel ratio {} must be positive",
                self.gui.pixel_ratio
            )));
        }
        Ok(())
    }

    /// Initial view geometry
    pub fn geometry(&self) -> ViewGeometry {
        ViewGeometry::new(self.gui.width, self.gui.height)
            .with_screen_origin(self.gui.x, self.gui.y)
            .with_pixel_ratio(self.gui.pixel_ratio)
    }

    /// Frame clear colour in BGRA
    pub fn clear_color(&self) -> [u8; 4] {
        if self.transparent_background {
            Color::TRANSPARENT.to_bgra()
        } else {
            self.background.to_bgra()
        }
    }

    /// Interface access policy described by this configuration
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::with_known_sites(self.access_level, self.known_sites.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gui.width, defaults::VIEW_WIDTH);
        assert_eq!(config.clear_color(), [255, 255, 255, 255]);
        assert_eq!(config.access_level, AccessLevel::Off);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ClientConfig::from_json_str(
            r#"{ "gui": { "width": 640, "height": 480 }, "access_level": "local_and_known" }"#,
        )
        .unwrap();

        assert_eq!(config.gui.width, 640);
        assert_eq!(config.gui.pixel_ratio, 1.0);
        assert_eq!(config.access_level, AccessLevel::LocalAndKnown);
        assert_eq!(config.known_sites.len(), DEFAULT_KNOWN_SITES.len());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            ClientConfig::from_json_str("{ not json"),
            Err(BridgeError::Json(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "gui": { "width": 0 } }"#),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "gui": { "pixel_ratio": -1.0 } }"#),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ClientConfig::load("/nonexistent/osrbridge.json"),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn test_geometry_and_colors() {
        let config = ClientConfig::default()
            .with_size(320, 200)
            .with_position(10, 20)
            .with_pixel_ratio(1.5)
            .with_background(Color::rgba(1, 2, 3, 4));

        let geometry = config.geometry();
        assert_eq!(geometry.view_rect().width, 320);
        assert_eq!(geometry.screen_point(2, 2), (13, 23));
        assert_eq!(config.clear_color(), [3, 2, 1, 4]);

        let transparent = ClientConfig {
            transparent_background: true,
            ..config
        };
        assert_eq!(transparent.clear_color(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_access_policy_from_config() {
        let config = ClientConfig::default().with_access_level(AccessLevel::LocalAndKnown);
        let policy = config.access_policy();
        assert!(policy.is_allowed("https://kodi.tv"));
    }
}
