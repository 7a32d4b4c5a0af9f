//! Process-wide `tracing` subscriber setup
//!
//! Applications that do not pass their own logger get messages through
//! `tracing`. This installs a stderr subscriber whose verbosity and shape
//! follow the same [`LogSettings`] the logger uses.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::logging::{LogFormat, LogSettings};
use crate::{Error, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `settings.level` when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_filter()));

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::String => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
