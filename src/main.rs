//! Parkind Streamer CLI
//!
//! Serves the connectivity check and, when collector addresses are
//! configured, streams camera frames to them on a background thread.

use clap::Parser;
use parkind_streamer::{
    capture::{Camera, CaptureConfig},
    config::{FileConfig, Settings},
    handshake::HandshakeServer,
    logging,
    metrics::{MetricsServer, MetricsServerConfig, StreamMetrics},
    session::{CameraSession, DestinationRegistry, SessionControl, SessionError},
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "config.toml";

/// Streams camera frames to a Parkind collector.
#[derive(Debug, Parser)]
#[command(name = "parkind-streamer", version, about)]
struct Args {
    /// Print informational messages
    #[arg(long)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Collector address to stream to, host[:port] (repeatable)
    #[arg(long = "destination", value_name = "ADDR")]
    destinations: Vec<String>,

    /// Port of the connectivity check server
    #[arg(long)]
    port: Option<u16>,
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    info!("Parkind Streamer v{}", parkind_streamer::VERSION);

    let file = match load_config(&args.config) {
        Ok(file) => file,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    let settings = match Settings::resolve(file, &args.destinations, args.port, args.verbose) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let metrics = match StreamMetrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            error!("Failed to create metrics registry: {}", e);
            process::exit(2);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown_tx.send_replace(true);
        }) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let registry = DestinationRegistry::new();
    for destination in &settings.destinations {
        registry.add(destination.clone());
    }
    let control = SessionControl::new();

    let streamer = if registry.is_empty() {
        info!("No collector configured; serving connectivity checks only");
        None
    } else {
        match spawn_streaming(
            settings.capture.clone(),
            registry.clone(),
            control.clone(),
            Arc::clone(&metrics),
            Arc::clone(&shutdown_tx),
        ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to start streaming thread: {}", e);
                process::exit(3);
            }
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            process::exit(2);
        }
    };
    let served = runtime.block_on(serve(&settings, metrics, shutdown_rx));

    // Stop-then-join: the session closes its cameras only after the loop exits.
    control.stop();
    let streamed = streamer.map(|handle| match handle.join() {
        Ok(result) => result,
        Err(_) => {
            error!("Streaming thread panicked");
            process::exit(3);
        }
    });

    if let Err(e) = served {
        error!("{}", e);
        process::exit(2);
    }
    if let Some(Err(e)) = streamed {
        error!("{}", e);
        process::exit(3);
    }
    info!("Done");
}

/// Reads the configuration file. A missing file at the default path falls
/// back to built-in defaults.
fn load_config(path: &Path) -> Result<FileConfig, parkind_streamer::capture::ConfigError> {
    if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        info!("No {} found, using default configuration", DEFAULT_CONFIG);
        return Ok(FileConfig::default());
    }
    FileConfig::from_file(path)
}

fn open_camera(index: u32) -> Box<dyn Camera> {
    #[cfg(feature = "camera")]
    {
        Box::new(parkind_streamer::capture::NokhwaCamera::new(index))
    }
    #[cfg(not(feature = "camera"))]
    {
        let _ = index;
        Box::new(parkind_streamer::capture::MockCamera::new())
    }
}

/// Opens the session and streams on a dedicated thread. A failed run
/// triggers process shutdown.
fn spawn_streaming(
    capture: CaptureConfig,
    registry: DestinationRegistry,
    control: SessionControl,
    metrics: Arc<StreamMetrics>,
    shutdown: Arc<watch::Sender<bool>>,
) -> std::io::Result<JoinHandle<Result<(), SessionError>>> {
    if cfg!(not(feature = "camera")) {
        warn!("Built without the `camera` feature; streaming synthetic frames");
    }

    thread::Builder::new()
        .name("camera-stream".into())
        .spawn(move || {
            let result = CameraSession::builder(capture)
                .registry(registry)
                .control(control)
                .metrics(metrics)
                .open(open_camera)
                .and_then(|mut session| {
                    let result = session.stream();
                    session.close();
                    result
                });

            if result.is_err() {
                shutdown.send_replace(true);
            }
            result
        })
}

/// Runs the handshake server, and the metrics exporter when enabled,
/// until shutdown is signalled.
async fn serve(
    settings: &Settings,
    metrics: Arc<StreamMetrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), parkind_streamer::ServerError> {
    if let Some(port) = settings.metrics_port {
        let exporter = MetricsServer::new(MetricsServerConfig::with_port(port), Arc::clone(&metrics));
        let stop = wait_for_shutdown(shutdown.clone());
        tokio::spawn(async move {
            if let Err(e) = exporter.run(stop).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    HandshakeServer::new(settings.server.clone())
        .with_metrics(metrics)
        .run(wait_for_shutdown(shutdown))
        .await
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    // Sender dropped also counts as shutdown.
    let _ = shutdown.wait_for(|stop| *stop).await;
    info!("Shutting down");
}
