//! Parkind Streamer Library
//!
//! Edge client for the Parkind collector: captures frames from one or more
//! cameras, pushes them at a bounded frame rate to remote collectors over
//! HTTP, and serves a token-guarded connectivity check so a collector can
//! verify it is talking to this client.
//!
//! # Architecture
//!
//! ```text
//! cameras → frame buffer → JPEG encode → POST per destination → collector
//!              ↑
//!        streaming loop (pacing, drops, stop)      handshake server ← collector
//! ```
//!
//! # Design Principles
//!
//! - **Bounded memory**: at most one live frame per camera
//! - **All-or-nothing construction**: a session either opens every camera or none
//! - **Fail fast**: capture and delivery errors end the run; the caller decides
//!   whether to retry
//! - **Cooperative stop**: observed only between loop iterations
//!
//! # Example
//!
//! ```no_run
//! use parkind_streamer::{
//!     capture::{Camera, CaptureConfig, MockCamera},
//!     session::{CameraSession, DestinationRegistry, SessionControl},
//! };
//!
//! let registry = DestinationRegistry::new();
//! registry.add_address("127.0.0.1:8000", "api/frame").unwrap();
//! let control = SessionControl::new();
//!
//! let worker = {
//!     let (registry, control) = (registry.clone(), control.clone());
//!     std::thread::spawn(move || {
//!         let mut session = CameraSession::builder(CaptureConfig::default())
//!             .registry(registry)
//!             .control(control)
//!             .open(|_| Box::new(MockCamera::new()) as Box<dyn Camera>)?;
//!         session.stream()
//!     })
//! };
//!
//! std::thread::sleep(std::time::Duration::from_secs(3));
//! control.stop();
//! worker.join().unwrap().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod handshake;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod transport;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, CaptureError, Frame, FrameBuffer, MockCamera};
pub use config::{FileConfig, Settings};
pub use handshake::{HandshakeServer, HandshakeToken};
pub use metrics::{ServerError, StreamMetrics};
pub use session::{CameraSession, Destination, DestinationRegistry, SessionControl, SessionError};
pub use transport::{TransportError, TransportSender};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
