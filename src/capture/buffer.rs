//! Most-recent-frame storage, one slot per device.
//!
//! A slot is emptied before its device is read again, so a session never
//! holds more than one live frame per camera no matter how long it runs.

use super::{Camera, CameraError, Frame};
use thiserror::Error;

/// Errors raised while pulling a frame into the buffer.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device reported a read error.
    #[error("unexpected error while reading from camera {device}: {source}")]
    ReadFailed {
        /// Index of the failing camera.
        device: usize,
        /// Error reported by the device.
        #[source]
        source: CameraError,
    },
    /// The device returned a frame with no pixels.
    #[error("retrieved an empty frame from camera {device}")]
    EmptyFrame {
        /// Index of the failing camera.
        device: usize,
    },
    /// The pixel buffer does not match the frame dimensions.
    #[error("camera {device} returned {bytes} bytes for a {width}x{height} frame")]
    MalformedFrame {
        /// Index of the failing camera.
        device: usize,
        /// Reported frame width.
        width: u32,
        /// Reported frame height.
        height: u32,
        /// Actual buffer length.
        bytes: usize,
    },
    /// No slot exists for this device index.
    #[error("no frame slot for camera {device}")]
    UnknownDevice {
        /// Index of the failing camera.
        device: usize,
    },
}

impl CaptureError {
    /// Index of the device that failed.
    pub fn device(&self) -> usize {
        match self {
            CaptureError::ReadFailed { device, .. }
            | CaptureError::EmptyFrame { device }
            | CaptureError::MalformedFrame { device, .. }
            | CaptureError::UnknownDevice { device } => *device,
        }
    }
}

/// Holds the latest frame of every device in a session.
#[derive(Debug)]
pub struct FrameBuffer {
    slots: Vec<Option<Frame>>,
    denoise: bool,
    /// Frames installed over the buffer's lifetime.
    allocated: u64,
    /// Frames dropped from a slot, either on overwrite or on release.
    released: u64,
}

impl FrameBuffer {
    /// Creates a buffer with one empty slot per device.
    pub fn new(devices: usize, denoise: bool) -> Self {
        Self {
            slots: (0..devices).map(|_| None).collect(),
            denoise,
            allocated: 0,
            released: 0,
        }
    }

    /// Reads the next frame of `device` into its slot.
    ///
    /// The previous frame is released before the camera is read. On error
    /// the slot stays empty.
    pub fn capture(
        &mut self,
        device: usize,
        camera: &mut dyn Camera,
    ) -> Result<&Frame, CaptureError> {
        if device >= self.slots.len() {
            return Err(CaptureError::UnknownDevice { device });
        }
        self.release(device);

        let frame = camera
            .capture()
            .map_err(|source| CaptureError::ReadFailed { device, source })?;
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame { device });
        }
        if !frame.is_valid() {
            return Err(CaptureError::MalformedFrame {
                device,
                width: frame.width(),
                height: frame.height(),
                bytes: frame.pixels().len(),
            });
        }

        let frame = self.preprocess(frame.with_device(device));
        self.allocated += 1;
        Ok(&*self.slots[device].insert(frame))
    }

    /// Captures one frame per camera, in device index order.
    pub fn capture_all(&mut self, cameras: &mut [Box<dyn Camera>]) -> Result<(), CaptureError> {
        for (device, camera) in cameras.iter_mut().enumerate() {
            self.capture(device, camera.as_mut())?;
        }
        Ok(())
    }

    // Pass-through until a denoising filter is chosen.
    fn preprocess(&self, frame: Frame) -> Frame {
        if self.denoise {
            tracing::trace!(device = frame.device(), "denoise hook (pass-through)");
        }
        frame
    }

    /// Returns the latest frame for `device`, if any.
    pub fn get(&self, device: usize) -> Option<&Frame> {
        self.slots.get(device).and_then(Option::as_ref)
    }

    /// Iterates over the buffered frames in device index order.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.slots.iter().flatten()
    }

    /// Number of device slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True for a buffer with no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of frames currently held.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Frames stored since creation.
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Frames dropped from a slot since creation.
    pub fn released(&self) -> u64 {
        self.released
    }

    fn release(&mut self, device: usize) {
        if self.slots[device].take().is_some() {
            self.released += 1;
        }
    }

    /// Releases every buffered frame. Empty slots are skipped, so calling
    /// this twice releases nothing the second time.
    pub fn release_all(&mut self) {
        for device in 0..self.slots.len() {
            self.release(device);
        }
    }
}
