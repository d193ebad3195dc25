//! Prometheus metrics for the streaming session.
//!
//! # Metrics Exposed
//!
//! - `parkind_streaming` - 1 while the streaming loop runs
//! - `parkind_frames_captured_total` - Frame sets captured
//! - `parkind_frames_dropped_total` - Shortfall against the target rate
//! - `parkind_deliveries_total` - Payloads accepted by destinations
//! - `parkind_payload_bytes_total` - Bytes accepted by destinations
//! - `parkind_handshake_rejections_total` - Connectivity checks answered 403
//!
//! The exporter listens on its own port so the handshake server keeps a
//! single route.

mod collector;
mod server;

pub use collector::{MetricsError, StreamMetrics};
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
