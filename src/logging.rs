use std::{error::Error, io};

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries command output, logs go to stderr
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}
