//! Capture sources.
//!
//! A session talks to every device through [`Camera`]; the hardware
//! backend lives in `device.rs` behind the `camera` feature and
//! [`MockCamera`] stands in for it everywhere else.

use super::{CaptureConfig, Frame};
use thiserror::Error;

/// Device-level failures reported by a [`Camera`].
#[derive(Debug, Error)]
pub enum CameraError {
    /// No device answers at the requested index.
    #[error("no such device: {0}")]
    DeviceNotFound(String),
    /// The device exists but could not be acquired.
    #[error("device refused to open: {0}")]
    OpenFailed(String),
    /// The capture settings were rejected.
    #[error("unusable capture settings: {0}")]
    ConfigFailed(String),
    /// A frame read failed.
    #[error("device read failed: {0}")]
    CaptureFailed(String),
    /// The camera was used before `open`.
    #[error("device is not open")]
    NotInitialized,
}

/// One physical or virtual camera.
///
/// A session owns one boxed `Camera` per device index. Implementations
/// need not be `Send`: sessions are built on the thread that streams.
pub trait Camera {
    /// Acquires the device and applies `config`.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Reads the next frame. Fails with [`CameraError::NotInitialized`]
    /// unless the camera is open.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// True between a successful `open` and `close`.
    fn is_open(&self) -> bool;

    /// Releases the device. Closing a closed camera does nothing.
    fn close(&mut self);
}

/// Synthetic RGB test pattern.
///
/// Used by the binary when built without the `camera` feature and by
/// tests; failures can be scripted for either opening or capturing.
#[derive(Debug, Default)]
pub struct MockCamera {
    settings: Option<(u32, u32)>,
    frames: u64,
    fail_open: bool,
    fail_after: Option<u64>,
    empty_frames: bool,
}

impl MockCamera {
    /// A mock that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera whose `open` always fails.
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// A camera that captures `frames` frames successfully and then fails.
    pub fn failing_after(frames: u64) -> Self {
        Self {
            fail_after: Some(frames),
            ..Self::default()
        }
    }

    /// A camera that reports success but hands back zero-sized frames.
    pub fn empty_frames() -> Self {
        Self {
            empty_frames: true,
            ..Self::default()
        }
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        if self.fail_open {
            return Err(CameraError::OpenFailed("mock device unavailable".into()));
        }
        if let Err(e) = config.validate() {
            return Err(CameraError::ConfigFailed(e.to_string()));
        }
        self.settings = Some((config.width, config.height));
        self.frames = 0;
        tracing::debug!(width = config.width, height = config.height, "mock device opened");
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let Some((width, height)) = self.settings else {
            return Err(CameraError::NotInitialized);
        };

        if self.fail_after.is_some_and(|limit| self.frames >= limit) {
            return Err(CameraError::CaptureFailed("mock read failure".into()));
        }
        self.frames += 1;

        if self.empty_frames {
            return Ok(Frame::rgb(Vec::new(), 0, 0, self.frames));
        }

        // Moving gradient so consecutive frames differ
        let shift = self.frames as u32;
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x ^ y) % 256) as u8);
            }
        }

        Ok(Frame::rgb(pixels, width, height, self.frames))
    }

    fn is_open(&self) -> bool {
        self.settings.is_some()
    }

    fn close(&mut self) {
        if self.settings.take().is_some() {
            tracing::debug!("mock device closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CaptureConfig {
        CaptureConfig::with_dimensions(8, 6)
    }

    #[test]
    fn test_open_capture_close() {
        let mut mock = MockCamera::new();
        mock.open(&small_config()).unwrap();

        let first = mock.capture().unwrap();
        let second = mock.capture().unwrap();
        assert_eq!((first.width(), first.height()), (8, 6));
        assert!(first.is_valid() && second.is_valid());
        assert_eq!(second.sequence(), first.sequence() + 1);
        assert_ne!(first.pixels(), second.pixels());

        mock.close();
        mock.close();
        assert!(!mock.is_open());
        assert!(matches!(mock.capture(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut mock = MockCamera::new();
        let mut config = small_config();
        config.fps = 0;
        assert!(matches!(mock.open(&config), Err(CameraError::ConfigFailed(_))));
        assert!(!mock.is_open());
    }

    #[test]
    fn test_scripted_failures() {
        let mut camera = MockCamera::failing_open();
        assert!(matches!(
            camera.open(&small_config()),
            Err(CameraError::OpenFailed(_))
        ));

        let mut camera = MockCamera::failing_after(1);
        camera.open(&small_config()).unwrap();
        assert!(camera.capture().is_ok());
        assert!(matches!(
            camera.capture(),
            Err(CameraError::CaptureFailed(_))
        ));
    }
}
