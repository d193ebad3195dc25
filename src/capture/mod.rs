//! Camera input and frame handling.
//!
//! Cameras are capture sources behind the [`Camera`] trait; the
//! [`FrameBuffer`] keeps the latest frame of each device of a session.

mod buffer;
mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;

pub use buffer::{CaptureError, FrameBuffer};
pub use camera::{Camera, CameraError, MockCamera};
pub use config::{CaptureConfig, ConfigError, MAX_FPS};
#[cfg(feature = "camera")]
pub use device::NokhwaCamera;
pub use frame::{Frame, PixelFormat};
