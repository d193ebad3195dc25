//! Process configuration.
//!
//! Settings come from a TOML file with command-line overrides layered on
//! top; the resolved [`Settings`] value is handed to every component that
//! needs it.

use crate::capture::{CaptureConfig, ConfigError};
use crate::handshake::HandshakeServerConfig;
use crate::session::Destination;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Port assumed for collector addresses that do not name one.
pub const DEFAULT_COLLECTOR_PORT: u16 = 8000;

/// Collector endpoint frames are pushed under.
pub const DEFAULT_ENDPOINT: &str = "api/frame";

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[capture]` table.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// `[server]` table.
    #[serde(default)]
    pub server: ServerConfig,
    /// `[collector]` table.
    #[serde(default)]
    pub collector: CollectorConfig,
    /// `[metrics]` table.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Handshake server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Connectivity check port.
    pub port: u16,
    /// Seconds before an unanswered request gets `408`.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout_secs: 10,
        }
    }
}

/// Where frames are pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Collector addresses, `host[:port]` or full `http(s)://` URLs.
    pub addresses: Vec<String>,
    /// Endpoint path appended to every address.
    pub endpoint: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl CollectorConfig {
    /// Resolves every address into a destination.
    pub fn destinations(&self) -> Result<Vec<Destination>, ConfigError> {
        self.addresses
            .iter()
            .map(|address| Destination::new(&with_default_port(address), &self.endpoint))
            .collect()
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Exporter port (0 to disable).
    pub port: u16,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parses and validates TOML configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        Ok(config)
    }
}

/// Appends the collector's default port to an address that has none.
fn with_default_port(address: &str) -> String {
    let address = address.trim();
    let (scheme, rest) = match address.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, address),
    };
    let (host, path) = match rest.find('/') {
        Some(at) => rest.split_at(at),
        None => (rest, ""),
    };
    let has_port = if host.starts_with('[') {
        host.contains("]:")
    } else {
        host.contains(':')
    };
    if has_port || host.is_empty() {
        return address.to_string();
    }

    match scheme {
        Some(scheme) => format!("{}://{}:{}{}", scheme, host, DEFAULT_COLLECTOR_PORT, path),
        None => format!("{}:{}{}", host, DEFAULT_COLLECTOR_PORT, path),
    }
}

/// Resolved configuration for one process run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Validated capture settings.
    pub capture: CaptureConfig,
    /// Handshake server address and timeout.
    pub server: HandshakeServerConfig,
    /// Collectors to push to, file entries first.
    pub destinations: Vec<Destination>,
    /// Metrics exporter port, `None` when disabled.
    pub metrics_port: Option<u16>,
    /// Informational logging requested.
    pub verbose: bool,
}

impl Settings {
    /// Merges the file configuration with command-line values.
    /// `extra_addresses` are appended after the file's collector list.
    pub fn resolve(
        mut file: FileConfig,
        extra_addresses: &[String],
        port_override: Option<u16>,
        verbose: bool,
    ) -> Result<Self, ConfigError> {
        file.capture.validate()?;
        file.collector
            .addresses
            .extend(extra_addresses.iter().cloned());
        let destinations = file.collector.destinations()?;

        let mut server = HandshakeServerConfig::with_port(port_override.unwrap_or(file.server.port));
        server.request_timeout = Duration::from_secs(file.server.request_timeout_secs.max(1));

        Ok(Self {
            capture: file.capture,
            server,
            destinations,
            metrics_port: (file.metrics.port != 0).then_some(file.metrics.port),
            verbose,
        })
    }

    /// Frame sets per second to stream.
    pub fn target_fps(&self) -> u32 {
        self.capture.fps
    }

    /// Number of cameras to open.
    pub fn camera_count(&self) -> u32 {
        self.capture.camera_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file_sections() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.collector.endpoint, "api/frame");
        assert_eq!(config.metrics.port, 0);
    }

    #[test]
    fn test_parse_full_file() {
        let config = FileConfig::parse(
            r#"
            [capture]
            camera_count = 2
            fps = 15
            width = 320
            height = 240

            [server]
            port = 9000

            [collector]
            addresses = ["10.0.0.5", "collector.local:9001"]
            endpoint = "frames"

            [metrics]
            port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.camera_count, 2);
        assert_eq!(config.capture.jpeg_quality, 80);
        let urls: Vec<String> = config
            .collector
            .destinations()
            .unwrap()
            .iter()
            .map(|d| d.push_url(1, 4))
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://10.0.0.5:8000/frames/1/4",
                "http://collector.local:9001/frames/1/4",
            ]
        );
    }

    #[test]
    fn test_invalid_capture_rejected() {
        let err = FileConfig::parse("[capture]\ncamera_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCameraCount(0)));

        let err = FileConfig::parse("[capture\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_empty_collector_address_rejected() {
        let config = FileConfig::parse("[collector]\naddresses = [\"\"]\n").unwrap();
        assert!(matches!(
            config.collector.destinations(),
            Err(ConfigError::InvalidDestination(..))
        ));

        let err = Settings::resolve(FileConfig::default(), &[" ".to_string()], None, false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDestination(..)));
    }

    #[test]
    fn test_default_port() {
        assert_eq!(with_default_port("10.0.0.1"), "10.0.0.1:8000");
        assert_eq!(with_default_port("10.0.0.1:81"), "10.0.0.1:81");
        assert_eq!(with_default_port("https://c.local/x"), "https://c.local:8000/x");
        assert_eq!(with_default_port("[::1]"), "[::1]:8000");
        assert_eq!(with_default_port("[::1]:90"), "[::1]:90");
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let mut file = FileConfig::default();
        file.collector.addresses.push("a".into());
        file.metrics.port = 9100;

        let settings = Settings::resolve(file, &["b:1".to_string()], Some(8181), true).unwrap();
        assert_eq!(settings.server.bind_addr.port(), 8181);
        assert_eq!(settings.destinations.len(), 2);
        assert_eq!(settings.destinations[1].as_str(), "http://b:1/api/frame");
        assert_eq!(settings.metrics_port, Some(9100));
        assert_eq!(settings.target_fps(), 1);
        assert_eq!(settings.camera_count(), 1);
        assert!(settings.verbose);
    }
}
