//! Streaming metrics registry.

use crate::transport::SendReport;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Registration or encoding failure.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Error from the prometheus registry or encoder.
    #[error("metrics registry: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics for a camera session.
///
/// Updated directly by the streaming loop and the handshake server.
pub struct StreamMetrics {
    registry: Registry,

    streaming: IntGauge,
    frames_captured: IntCounter,
    frames_dropped: IntCounter,
    deliveries: IntCounter,
    payload_bytes: IntCounter,
    handshake_rejections: IntCounter,
}

impl StreamMetrics {
    /// Builds a private registry holding every session metric.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let streaming = IntGauge::new(
            "parkind_streaming",
            "Whether the streaming loop is running (1=running, 0=idle or stopped)",
        )?;
        let frames_captured = IntCounter::new(
            "parkind_frames_captured_total",
            "Frame sets captured across all cameras",
        )?;
        let frames_dropped = IntCounter::new(
            "parkind_frames_dropped_total",
            "Frames short of the target rate, summed over accounting windows",
        )?;
        let deliveries = IntCounter::new(
            "parkind_deliveries_total",
            "Frame payloads accepted by a destination",
        )?;
        let payload_bytes = IntCounter::new(
            "parkind_payload_bytes_total",
            "Encoded payload bytes accepted by destinations",
        )?;
        let handshake_rejections = IntCounter::new(
            "parkind_handshake_rejections_total",
            "Connectivity checks answered with 403",
        )?;

        let collectors: [Box<dyn Collector>; 6] = [
            Box::new(streaming.clone()),
            Box::new(frames_captured.clone()),
            Box::new(frames_dropped.clone()),
            Box::new(deliveries.clone()),
            Box::new(payload_bytes.clone()),
            Box::new(handshake_rejections.clone()),
        ];
        for collector in collectors {
            registry.register(collector)?;
        }

        Ok(Self {
            registry,
            streaming,
            frames_captured,
            frames_dropped,
            deliveries,
            payload_bytes,
            handshake_rejections,
        })
    }

    /// Sets the streaming gauge.
    pub fn set_streaming(&self, running: bool) {
        self.streaming.set(i64::from(running));
    }

    /// Counts one captured frame set.
    pub fn record_capture(&self) {
        self.frames_captured.inc();
    }

    /// Adds a window's shortfall to the dropped counter.
    pub fn record_drop(&self, dropped: u32) {
        self.frames_dropped.inc_by(u64::from(dropped));
    }

    /// Adds a send cycle's deliveries and bytes.
    pub fn record_send(&self, report: &SendReport) {
        self.deliveries.inc_by(report.deliveries);
        self.payload_bytes.inc_by(report.bytes);
    }

    /// Counts one connectivity check answered with 403.
    pub fn record_handshake_rejection(&self) {
        self.handshake_rejections.inc();
    }

    /// Current value of the streaming gauge.
    pub fn is_streaming(&self) -> bool {
        self.streaming.get() != 0
    }

    /// Frame sets captured so far.
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.get()
    }

    /// Frames dropped so far.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.get()
    }

    /// Payloads accepted by destinations so far.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.get()
    }

    /// Connectivity checks rejected so far.
    pub fn handshake_rejections(&self) -> u64 {
        self.handshake_rejections.get()
    }

    /// Underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut text = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut text)?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

impl std::fmt::Debug for StreamMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMetrics")
            .field("frames_captured", &self.frames_captured())
            .field("frames_dropped", &self.frames_dropped())
            .field("deliveries", &self.deliveries())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_registry_exports_every_family_at_zero() {
        let metrics = StreamMetrics::new().unwrap();
        let text = metrics.encode().unwrap();

        for name in [
            "parkind_streaming 0",
            "parkind_frames_captured_total 0",
            "parkind_frames_dropped_total 0",
            "parkind_deliveries_total 0",
            "parkind_payload_bytes_total 0",
            "parkind_handshake_rejections_total 0",
        ] {
            assert!(text.contains(name), "missing {name}");
        }
        assert!(!metrics.is_streaming());
    }

    #[test]
    fn test_loop_activity_is_counted() {
        let metrics = StreamMetrics::new().unwrap();

        metrics.set_streaming(true);
        metrics.record_capture();
        metrics.record_capture();
        metrics.record_drop(3);
        metrics.record_send(&SendReport {
            deliveries: 2,
            bytes: 2048,
        });
        metrics.record_handshake_rejection();

        let text = metrics.encode().unwrap();
        assert!(text.contains("parkind_streaming 1"));
        assert!(text.contains("parkind_payload_bytes_total 2048"));
        assert_eq!(metrics.frames_captured(), 2);
        assert_eq!(metrics.frames_dropped(), 3);
        assert_eq!(metrics.deliveries(), 2);
        assert_eq!(metrics.handshake_rejections(), 1);
        assert!(metrics.is_streaming());
    }
}
