//! Tracing subscriber setup for binaries embedding the wallet engine.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::WalletError;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Structured JSON, one object per line.
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Fails if a global subscriber
/// is already installed.
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), WalletError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init(),
    };
    result.map_err(|e| WalletError::Config(format!("logging: {e}")))
}
