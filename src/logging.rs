//! Console logging setup.

use std::fmt::Write as _;
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};
use tracing_subscriber::EnvFilter;

/// Timestamp layout of every log line, e.g. `02/01/2006 15:04:05`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Local wall-clock timer in [`TIMESTAMP_FORMAT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTime;

impl FormatTime for ConsoleTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", chrono::Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Default level for the verbosity flag: informational messages only
/// show up in verbose mode. `RUST_LOG` is honoured on top.
pub fn default_level(verbose: bool) -> Level {
    if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// Installs the global subscriber. Call once, from the binary.
pub fn init(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level(verbose).into()),
        )
        .with_timer(ConsoleTime)
        .with_target(false)
        .init();
}
