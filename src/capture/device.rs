//! Physical camera backed by `nokhwa`.

use super::{Camera, CameraError, CaptureConfig, Frame};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};

/// A camera device opened by index through the platform's native backend.
pub struct NokhwaCamera {
    index: u32,
    inner: Option<nokhwa::Camera>,
    sequence: u64,
}

impl NokhwaCamera {
    /// Camera at platform device `index`, not yet opened.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            inner: None,
            sequence: 0,
        }
    }
}

impl Camera for NokhwaCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let format = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|e| CameraError::OpenFailed(format!("device {}: {}", self.index, e)))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::OpenFailed(format!("device {}: {}", self.index, e)))?;

        tracing::info!(
            device = self.index,
            format = ?camera.camera_format(),
            "Camera opened"
        );
        self.inner = Some(camera);
        self.sequence = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let camera = self.inner.as_mut().ok_or(CameraError::NotInitialized)?;

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        let (width, height) = image.dimensions();
        self.sequence += 1;
        Ok(Frame::rgb(image.into_raw(), width, height, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.inner.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!(device = self.index, error = %e, "Failed to stop camera stream");
            }
            tracing::info!(device = self.index, "Camera closed");
        }
    }
}
