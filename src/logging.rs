//! Tracing subscriber setup.
//!
//! Stdout carries the protocol, so logs go to stderr or to a file, never to
//! stdout.
//!
//! Without `logFileName`, log events and the transport's diagnostic lines
//! both go to stderr. The subscriber does not take the transport's writer
//! lock, so the two sources are not ordered against each other; each side
//! submits whole lines in a single write, so they interleave only at line
//! boundaries. Set `logFileName` (or `errorFileName`) to keep them apart.

use crate::config::{ConfigError, ProcessConfig};
use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;

/// Error type for logging initialisation.
#[derive(Error, Debug)]
pub enum LoggingError {
  /// The level in the configuration is not valid.
  #[error(transparent)]
  Config(#[from] ConfigError),
  /// The log file could not be opened.
  #[error("cannot open log file: {0}")]
  Io(#[from] std::io::Error),
  /// A global subscriber is already installed.
  #[error("logging already initialised: {0}")]
  AlreadyInitialized(String),
}

/// Installs the global subscriber described by `config`.
pub fn init(config: &ProcessConfig) -> Result<(), LoggingError> {
  let level = config.level()?;
  let builder = tracing_subscriber::fmt()
    .with_max_level(level)
    .with_ansi(false)
    .with_target(true);

  let installed = match &config.log_file_name {
    Some(path) => {
      let file = OpenOptions::new().create(true).append(true).open(path)?;
      builder.with_writer(Mutex::new(file)).try_init()
    }
    None => builder.with_writer(std::io::stderr).try_init(),
  };

  installed.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
