//! Camera streaming session.
//!
//! A [`CameraSession`] owns the camera handles and their frame buffer, and
//! runs the rate-limited streaming loop that pushes every captured frame
//! set to the registered destinations.
//!
//! # Lifecycle
//!
//! ```text
//! open ──► Idle ──stream()──► Running ──stop──► Stopped ──stream()──► Running …
//!                    │                  └─error─► Stopped
//!                    └─ no destinations: stays Idle
//! close() releases every camera and frame; the session is unusable after.
//! ```
//!
//! The loop holds the destination lock for its whole run, so
//! [`DestinationRegistry::add`] called while streaming blocks until the
//! loop exits. Stopping is cooperative: [`SessionControl::stop`] is only
//! observed between iterations, never mid-capture or mid-send.
//!
//! # Example
//!
//! ```no_run
//! use parkind_streamer::capture::{Camera, CaptureConfig, MockCamera};
//! use parkind_streamer::session::CameraSession;
//!
//! let config = CaptureConfig::default();
//! let mut session = CameraSession::open(&config, |_| {
//!     Box::new(MockCamera::new()) as Box<dyn Camera>
//! })
//! .unwrap();
//!
//! session.add_destination("127.0.0.1:8000", "api/frame").unwrap();
//! let control = session.control();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     control.stop();
//! });
//! session.stream().unwrap();
//! session.close();
//! ```

mod pacing;
mod registry;

pub use pacing::{Pacer, Tick, WINDOW};
pub use registry::{Destination, DestinationRegistry};

use crate::capture::{
    Camera, CameraError, CaptureConfig, CaptureError, ConfigError, FrameBuffer,
};
use crate::metrics::StreamMetrics;
use crate::transport::{TransportError, TransportSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use thiserror::Error;

/// Errors surfaced by session construction and the streaming loop.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The capture settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A camera failed to open; the others were closed again.
    #[error("failed to open camera {device}: {source}")]
    Construction {
        /// Index of the camera that failed to open.
        device: usize,
        /// Error reported by the device.
        #[source]
        source: CameraError,
    },
    /// Streaming was requested with no destination registered.
    #[error("insufficient amount of streaming destinations")]
    NoDestinations,
    /// A frame read failed during the run.
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// Encoding or delivery failed during the run.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The session was already closed.
    #[error("camera session is closed")]
    Closed,
}

/// Streaming state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed, never streamed.
    #[default]
    Idle,
    /// Inside the pacing loop.
    Running,
    /// A run ended, cleanly or with an error. Resources are still held.
    Stopped,
}

#[derive(Debug, Default)]
struct ControlInner {
    stop: AtomicBool,
    state: Mutex<StreamState>,
}

/// Cloneable handle used to stop a session from another thread and to
/// observe its streaming state.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    inner: Arc<ControlInner>,
}

impl SessionControl {
    /// Control with no stop requested and state `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to stop at its next iteration boundary.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
    }

    /// True once a stop is requested and not yet consumed by a run.
    pub fn stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    /// Current streaming state.
    pub fn state(&self) -> StreamState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: StreamState) {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn clear_stop(&self) {
        self.inner.stop.store(false, Ordering::SeqCst);
    }
}

/// Configures and opens a [`CameraSession`].
pub struct SessionBuilder {
    config: CaptureConfig,
    registry: DestinationRegistry,
    control: SessionControl,
    sender: Option<TransportSender>,
    metrics: Option<Arc<StreamMetrics>>,
}

impl SessionBuilder {
    /// Shares an existing destination list with the session.
    pub fn registry(mut self, registry: DestinationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Shares an existing control handle with the session.
    pub fn control(mut self, control: SessionControl) -> Self {
        self.control = control;
        self
    }

    /// Replaces the default HTTP sender.
    pub fn sender(mut self, sender: TransportSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Records loop activity into `metrics`.
    pub fn metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Opens `camera_count` devices, asking `factory` for the camera at
    /// each index. All-or-nothing: if any device fails to open, every
    /// camera opened so far is closed again before the error is returned.
    pub fn open<F>(self, mut factory: F) -> Result<CameraSession, SessionError>
    where
        F: FnMut(u32) -> Box<dyn Camera>,
    {
        self.config.validate()?;

        let count = self.config.camera_count as usize;
        let mut cameras: Vec<Box<dyn Camera>> = Vec::with_capacity(count);
        for index in 0..self.config.camera_count {
            let mut camera = factory(index);
            if let Err(source) = camera.open(&self.config) {
                for opened in cameras.iter_mut().rev() {
                    opened.close();
                }
                return Err(SessionError::Construction {
                    device: index as usize,
                    source,
                });
            }
            cameras.push(camera);
        }

        tracing::info!(
            cameras = count,
            fps = self.config.fps,
            "Camera session opened"
        );

        let sender = self
            .sender
            .unwrap_or_else(|| TransportSender::http(self.config.jpeg_quality));

        Ok(CameraSession {
            cameras,
            frames: FrameBuffer::new(count, self.config.denoise),
            target_fps: self.config.fps,
            registry: self.registry,
            control: self.control,
            sender,
            metrics: self.metrics,
            sequence: 0,
            closed: false,
        })
    }
}

/// Captures frames from a fixed set of cameras and streams them.
pub struct CameraSession {
    cameras: Vec<Box<dyn Camera>>,
    frames: FrameBuffer,
    target_fps: u32,
    registry: DestinationRegistry,
    control: SessionControl,
    sender: TransportSender,
    metrics: Option<Arc<StreamMetrics>>,
    /// Frame index of the next send cycle.
    sequence: u64,
    closed: bool,
}

impl CameraSession {
    /// Starts configuring a session for `config`.
    pub fn builder(config: CaptureConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            registry: DestinationRegistry::new(),
            control: SessionControl::new(),
            sender: None,
            metrics: None,
        }
    }

    /// Opens a session with a fresh registry, control and HTTP sender.
    pub fn open<F>(config: &CaptureConfig, factory: F) -> Result<Self, SessionError>
    where
        F: FnMut(u32) -> Box<dyn Camera>,
    {
        Self::builder(config.clone()).open(factory)
    }

    /// Registers a push target. Blocks while the session is streaming.
    pub fn add_destination(&self, address: &str, endpoint: &str) -> Result<(), ConfigError> {
        self.registry.add_address(address, endpoint)
    }

    /// Runs the streaming loop on the calling thread until a stop is
    /// requested or a capture or transport error ends the run.
    pub fn stream(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }

        let registry = self.registry.clone();
        let destinations = registry.lock();
        if destinations.is_empty() {
            return Err(SessionError::NoDestinations);
        }

        self.control.set_state(StreamState::Running);
        if let Some(metrics) = &self.metrics {
            metrics.set_streaming(true);
        }
        tracing::info!(
            destinations = destinations.len(),
            fps = self.target_fps,
            "Streaming started"
        );

        let result = self.run(&destinations);

        // A stop request is consumed by the run it ended.
        self.control.clear_stop();
        self.control.set_state(StreamState::Stopped);
        if let Some(metrics) = &self.metrics {
            metrics.set_streaming(false);
        }
        match &result {
            Ok(()) => tracing::info!("Streaming stopped"),
            Err(e) => tracing::error!(error = %e, "Streaming aborted"),
        }
        result
    }

    fn run(&mut self, destinations: &[Destination]) -> Result<(), SessionError> {
        let mut pacer = Pacer::new(self.target_fps, Instant::now());

        while !self.control.stop_requested() {
            match pacer.tick(Instant::now()) {
                Tick::WindowClosed { dropped } => {
                    if dropped > 0 {
                        tracing::warn!(dropped, "dropped {} frames", dropped);
                        if let Some(metrics) = &self.metrics {
                            metrics.record_drop(dropped);
                        }
                    }
                    continue;
                }
                Tick::Throttle(remaining) => {
                    thread::sleep(remaining);
                    continue;
                }
                Tick::Capture => {}
            }

            self.frames.capture_all(&mut self.cameras)?;
            pacer.record_capture();
            if let Some(metrics) = &self.metrics {
                metrics.record_capture();
            }

            let sequence = self.sequence;
            self.sequence += 1;
            let report = self
                .sender
                .send(self.frames.frames(), destinations, sequence)?;
            if let Some(metrics) = &self.metrics {
                metrics.record_send(&report);
            }

            thread::sleep(pacer.interval());
        }
        Ok(())
    }

    /// Closes every camera and releases every buffered frame. Later calls
    /// do nothing. The shared control is left as is, so another session
    /// built on it can still stream.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for camera in self.cameras.iter_mut() {
            camera.close();
        }
        self.frames.release_all();
        self.closed = true;
        tracing::info!(cameras = self.cameras.len(), "Camera session closed");
    }

    /// True after [`CameraSession::close`].
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Current streaming state.
    pub fn state(&self) -> StreamState {
        self.control.state()
    }

    /// Handle for stopping the loop from another thread.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Handle to the destination list.
    pub fn registry(&self) -> DestinationRegistry {
        self.registry.clone()
    }

    /// Frame sets per second the loop aims for.
    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Number of open cameras.
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// The session's frame buffer.
    pub fn frames(&self) -> &FrameBuffer {
        &self.frames
    }

    /// Frame index the next send cycle will use.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("cameras", &self.cameras.len())
            .field("target_fps", &self.target_fps)
            .field("state", &self.state())
            .field("sequence", &self.sequence)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
