//! Push destinations shared between the session owner and the streaming loop.

use crate::capture::ConfigError;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

/// A collector endpoint frames are pushed to.
///
/// Holds `scheme://host[:port]/endpoint`; the per-frame URL appends the
/// device index and the frame sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    base: Url,
}

impl Destination {
    /// Builds a destination from a collector address and an endpoint path.
    ///
    /// Addresses without a scheme are treated as plain `http`.
    pub fn new(address: &str, endpoint: &str) -> Result<Self, ConfigError> {
        let address = address.trim();
        let host = address.split_once("://").map_or(address, |(_, rest)| rest);
        if host.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidDestination(
                address.to_string(),
                "missing host".into(),
            ));
        }
        let address = address.trim_end_matches('/');
        let endpoint = endpoint.trim_matches('/');
        let raw = if address.contains("://") {
            format!("{}/{}", address, endpoint)
        } else {
            format!("http://{}/{}", address, endpoint)
        };

        let base = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidDestination(raw.clone(), e.to_string()))?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidDestination(
                    raw,
                    format!("unsupported scheme '{}'", other),
                ))
            }
        }
        if base.host_str().is_none() {
            return Err(ConfigError::InvalidDestination(raw, "missing host".into()));
        }
        Ok(Self { base })
    }

    /// URL for one device's frame of send cycle `sequence`.
    pub fn push_url(&self, device: usize, sequence: u64) -> String {
        format!(
            "{}/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            device,
            sequence
        )
    }

    /// Base URL without device and sequence.
    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())
    }
}

/// Cloneable handle to a session's destination list.
///
/// The streaming loop holds the lock for as long as it runs, so
/// [`DestinationRegistry::add`] blocks until streaming stops and the new
/// destination only applies to the next run.
#[derive(Debug, Clone, Default)]
pub struct DestinationRegistry {
    inner: Arc<Mutex<Vec<Destination>>>,
}

impl DestinationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a destination. No duplicate check and no reachability probe.
    pub fn add(&self, destination: Destination) {
        tracing::info!(destination = %destination, "Added streaming destination");
        self.lock().push(destination);
    }

    /// Parses `address`/`endpoint` and appends the result.
    pub fn add_address(&self, address: &str, endpoint: &str) -> Result<(), ConfigError> {
        self.add(Destination::new(address, endpoint)?);
        Ok(())
    }

    /// Number of registered destinations. Blocks while streaming.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True with no destinations. Blocks while streaming.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current list, in registration order.
    pub fn snapshot(&self) -> Vec<Destination> {
        self.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Destination>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address_gets_http() {
        let dest = Destination::new("127.0.0.1:8000", "api/frame").unwrap();
        assert_eq!(dest.as_str(), "http://127.0.0.1:8000/api/frame");
        assert_eq!(dest.push_url(0, 7), "http://127.0.0.1:8000/api/frame/0/7");
    }

    #[test]
    fn test_slashes_normalised() {
        let dest = Destination::new("https://collector.local/", "/ingest/").unwrap();
        assert_eq!(dest.push_url(2, 1), "https://collector.local/ingest/2/1");
    }

    #[test]
    fn test_rejects_bad_destinations() {
        assert!(matches!(
            Destination::new("ftp://collector", "frames"),
            Err(ConfigError::InvalidDestination(..))
        ));
        assert!(Destination::new("", "frames").is_err());
    }

    #[test]
    fn test_empty_host_never_borrows_the_endpoint() {
        for address in ["", "   ", "/", "http://", "https:///"] {
            assert!(
                matches!(
                    Destination::new(address, "api/frame"),
                    Err(ConfigError::InvalidDestination(..))
                ),
                "accepted {address:?}"
            );
        }
    }

    #[test]
    fn test_registry_keeps_order_and_duplicates() {
        let registry = DestinationRegistry::new();
        assert!(registry.is_empty());

        registry.add_address("a:1", "x").unwrap();
        registry.add_address("b:2", "x").unwrap();
        registry.add_address("a:1", "x").unwrap();

        let hosts: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|d| d.push_url(0, 0))
            .collect();
        assert_eq!(
            hosts,
            vec!["http://a:1/x/0/0", "http://b:2/x/0/0", "http://a:1/x/0/0"]
        );

        let clone = registry.clone();
        clone.add_address("c:3", "x").unwrap();
        assert_eq!(registry.len(), 4);
    }
}
