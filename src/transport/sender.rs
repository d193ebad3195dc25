//! Blocking HTTP delivery of encoded frames.

use super::encode::{encode_jpeg, JPEG_CONTENT_TYPE};
use crate::capture::Frame;
use crate::session::Destination;
use thiserror::Error;

/// Status a collector answers with when it has taken a frame.
pub const ACCEPTED_STATUS: u16 = 202;

/// Error type returned by [`FramePoster`] implementations.
pub type PostError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while encoding or delivering a frame set.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The frame could not be encoded.
    #[error("failed to encode frame from camera {device}: {reason}")]
    Encode {
        /// Index of the camera whose frame failed.
        device: usize,
        /// Why the encoder refused the frame.
        reason: String,
    },
    /// The request did not get a response.
    #[error("request to {url} for camera {device} failed: {source}")]
    Request {
        /// Push URL of the request.
        url: String,
        /// Index of the camera whose frame was sent.
        device: usize,
        /// Error from the poster.
        #[source]
        source: PostError,
    },
    /// The collector answered with a status other than 202.
    #[error("{url} answered camera {device} with http status {status} (expected {expected})", expected = ACCEPTED_STATUS)]
    UnexpectedStatus {
        /// Push URL of the request.
        url: String,
        /// Index of the camera whose frame was sent.
        device: usize,
        /// Status the collector answered with.
        status: u16,
    },
}

impl TransportError {
    /// Index of the camera whose frame failed.
    pub fn device(&self) -> usize {
        match self {
            TransportError::Encode { device, .. }
            | TransportError::Request { device, .. }
            | TransportError::UnexpectedStatus { device, .. } => *device,
        }
    }
}

/// Performs one blocking POST and returns the response status.
///
/// Non-2xx statuses are not errors at this level; only failures to get
/// any response are.
pub trait FramePoster: Send {
    /// POSTs `body` to `url` and returns the response status.
    fn post(&self, url: &str, content_type: &str, body: &[u8]) -> Result<u16, PostError>;
}

/// [`FramePoster`] backed by a shared `ureq` agent.
#[derive(Clone)]
pub struct HttpPoster {
    agent: ureq::Agent,
}

impl HttpPoster {
    /// Poster with a default `ureq` agent.
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for HttpPoster {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePoster for HttpPoster {
    fn post(&self, url: &str, content_type: &str, body: &[u8]) -> Result<u16, PostError> {
        match self
            .agent
            .post(url)
            .set("Content-Type", content_type)
            .send_bytes(body)
        {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(status, _)) => Ok(status),
            Err(e) => Err(e.into()),
        }
    }
}

/// Outcome of a successful send cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// POSTs answered with the accepted status.
    pub deliveries: u64,
    /// Payload bytes delivered across all POSTs.
    pub bytes: u64,
}

/// Encodes frame sets and pushes them to destinations.
pub struct TransportSender {
    poster: Box<dyn FramePoster>,
    quality: u8,
}

impl TransportSender {
    /// Sender encoding at JPEG `quality` and posting through `poster`.
    pub fn new(poster: Box<dyn FramePoster>, quality: u8) -> Self {
        Self { poster, quality }
    }

    /// Sender using [`HttpPoster`].
    pub fn http(quality: u8) -> Self {
        Self::new(Box::new(HttpPoster::new()), quality)
    }

    /// Sends every frame to every destination, devices first, then
    /// destinations in registration order. Stops at the first failure.
    pub fn send<'a, I>(
        &self,
        frames: I,
        destinations: &[Destination],
        sequence: u64,
    ) -> Result<SendReport, TransportError>
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        let mut report = SendReport::default();

        for frame in frames {
            let device = frame.device();
            let payload = encode_jpeg(frame, self.quality)?;

            for destination in destinations {
                let url = destination.push_url(device, sequence);
                let status = self
                    .poster
                    .post(&url, JPEG_CONTENT_TYPE, &payload)
                    .map_err(|source| TransportError::Request {
                        url: url.clone(),
                        device,
                        source,
                    })?;

                if status != ACCEPTED_STATUS {
                    return Err(TransportError::UnexpectedStatus {
                        url,
                        device,
                        status,
                    });
                }

                tracing::trace!(%url, bytes = payload.len(), "Frame delivered");
                report.deliveries += 1;
                report.bytes += payload.len() as u64;
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for TransportSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSender")
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}
