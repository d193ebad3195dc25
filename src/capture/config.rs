//! Settings applied to every camera of a session.

use serde::{Deserialize, Serialize};

/// Highest frame rate a session accepts.
pub const MAX_FPS: u32 = 120;

/// The `[capture]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Number of devices to open, indices `0..camera_count`.
    pub camera_count: u32,
    /// Requested resolution; a device may round to its closest mode.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Frame sets per second the streaming loop aims for.
    pub fps: u32,
    /// Enables the per-frame preprocessing hook.
    pub denoise: bool,
    /// Encoder quality, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_count: 1,
            width: 640,
            height: 480,
            fps: 1,
            denoise: false,
            jpeg_quality: 80,
        }
    }
}

impl CaptureConfig {
    /// Defaults with a different resolution.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Rejects settings no session can run with. Checked again at
    /// construction so hand-built values cannot bypass it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera_count == 0 {
            return Err(ConfigError::InvalidCameraCount(self.camera_count));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if !(1..=MAX_FPS).contains(&self.fps) {
            return Err(ConfigError::InvalidFrameRate(self.fps));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        Ok(())
    }
}

/// Rejected configuration, from the file or the command line.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// At least one camera is required.
    #[error("invalid amount of cameras {0}")]
    InvalidCameraCount(u32),
    /// Width or height is zero.
    #[error("width and height must both be non-zero")]
    InvalidDimensions,
    /// Frame rate outside the supported range.
    #[error("frame rate {0} outside 1..=120")]
    InvalidFrameRate(u32),
    /// JPEG quality outside 1 to 100.
    #[error("jpeg quality {0} outside 1..=100")]
    InvalidQuality(u8),
    /// A collector address that cannot be turned into a URL.
    #[error("bad collector address '{0}': {1}")]
    InvalidDestination(String, String),
    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    FileReadError(String),
    /// The configuration file is not valid TOML for this format.
    #[error("malformed configuration: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(edit: impl FnOnce(&mut CaptureConfig)) -> ConfigError {
        let mut config = CaptureConfig::default();
        edit(&mut config);
        config.validate().unwrap_err()
    }

    #[test]
    fn test_defaults_stream_one_camera_at_one_fps() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.camera_count, config.fps, config.jpeg_quality), (1, 1, 80));
    }

    #[test]
    fn test_each_bound_is_checked() {
        assert!(matches!(
            rejected(|c| c.camera_count = 0),
            ConfigError::InvalidCameraCount(0)
        ));
        assert!(matches!(rejected(|c| c.height = 0), ConfigError::InvalidDimensions));
        assert!(matches!(
            rejected(|c| c.fps = MAX_FPS + 1),
            ConfigError::InvalidFrameRate(121)
        ));
        assert!(matches!(rejected(|c| c.jpeg_quality = 0), ConfigError::InvalidQuality(0)));
    }
}
