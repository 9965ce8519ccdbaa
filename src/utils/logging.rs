//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` formatter according to [`LoggingConfig`].
//! `RUST_LOG` takes precedence over the configured level when it is set.

use crate::config::LoggingConfig;
use crate::error::{constants, ProtocolError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()))
}

fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter> {
    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError(
                "log_file_path must be specified when log_to_file is true".to_string(),
            )
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ProtocolError::ConfigError(format!("{} '{path}': {e}", constants::ERR_LOG_FILE))
            })?;

        if config.log_to_console {
            use tracing_subscriber::fmt::writer::MakeWriterExt;
            return Ok(BoxMakeWriter::new(Mutex::new(file).and(std::io::stderr)));
        }
        return Ok(BoxMakeWriter::new(Mutex::new(file)));
    }
    Ok(BoxMakeWriter::new(std::io::stderr))
}

/// Install the global subscriber described by `config`.
///
/// Fails with `ConfigError` if a subscriber is already installed or the log
/// file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ProtocolError::ConfigError(errors.join("; ")));
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(make_writer(config)?)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_LOGGER_INSTALL))
    })?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
