//! Process configuration.
//!
//! Settings come from a JSON file (every key optional) or from the builder
//! methods. Keys:
//!
//! | key | default |
//! |---|---|
//! | `streamName` | unset |
//! | `inputFileName` | stdin |
//! | `outputFileName` | stdout |
//! | `errorFileName` | stderr |
//! | `checkpointRetries` | 5 |
//! | `checkpointFreqSeconds` | 60 |
//! | `logFileName` | stderr |
//! | `logLevel` | `info` |

use crate::policy::CheckpointPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Error type for loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
  /// The file could not be read.
  #[error("io error reading {path}: {source}")]
  Io {
    /// File that failed.
    path: PathBuf,
    /// Underlying error.
    #[source]
    source: std::io::Error,
  },
  /// The file is not valid configuration json.
  #[error("invalid configuration: {0}")]
  Parse(#[from] serde_json::Error),
  /// A value is out of range.
  #[error("invalid value for `{key}`: {message}")]
  Invalid {
    /// Offending key.
    key: &'static str,
    /// What is wrong with it.
    message: String,
  },
}

/// Settings for one record processor process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessConfig {
  /// Stream being consumed; informational only.
  pub stream_name: Option<String>,
  /// Inbound command stream; stdin when unset.
  pub input_file_name: Option<PathBuf>,
  /// Outbound protocol stream; stdout when unset.
  pub output_file_name: Option<PathBuf>,
  /// Diagnostic stream; stderr when unset.
  pub error_file_name: Option<PathBuf>,
  /// Attempts per checkpoint.
  pub checkpoint_retries: u32,
  /// Seconds between automatic checkpoints, also the retry wait.
  pub checkpoint_freq_seconds: u64,
  /// Log destination; stderr when unset. Never stdout.
  pub log_file_name: Option<PathBuf>,
  /// Maximum log level (`trace`, `debug`, `info`, `warn`, `error`).
  pub log_level: String,
}

impl Default for ProcessConfig {
  fn default() -> Self {
    Self {
      stream_name: None,
      input_file_name: None,
      output_file_name: None,
      error_file_name: None,
      checkpoint_retries: 5,
      checkpoint_freq_seconds: 60,
      log_file_name: None,
      log_level: "info".to_string(),
    }
  }
}

impl ProcessConfig {
  /// Loads and validates a JSON configuration file.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&json)
  }

  /// Parses and validates configuration JSON.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let config: ProcessConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
  }

  /// Checks values that serde cannot.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.level()?;
    Ok(())
  }

  /// The configured log level.
  pub fn level(&self) -> Result<tracing::Level, ConfigError> {
    tracing::Level::from_str(&self.log_level).map_err(|e| ConfigError::Invalid {
      key: "logLevel",
      message: e.to_string(),
    })
  }

  /// Checkpoint policy derived from these settings.
  pub fn checkpoint_policy(&self) -> CheckpointPolicy {
    CheckpointPolicy::new(
      Duration::from_secs(self.checkpoint_freq_seconds),
      self.checkpoint_retries,
    )
  }

  /// Sets the stream name.
  pub fn with_stream_name(mut self, name: impl Into<String>) -> Self {
    self.stream_name = Some(name.into());
    self
  }

  /// Reads commands from `path` instead of stdin.
  pub fn with_input_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.input_file_name = Some(path.into());
    self
  }

  /// Writes protocol lines to `path` instead of stdout.
  pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.output_file_name = Some(path.into());
    self
  }

  /// Writes diagnostics to `path` instead of stderr.
  pub fn with_error_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.error_file_name = Some(path.into());
    self
  }

  /// Sets the checkpoint retry budget.
  pub fn with_checkpoint_retries(mut self, retries: u32) -> Self {
    self.checkpoint_retries = retries;
    self
  }

  /// Sets the checkpoint interval in seconds.
  pub fn with_checkpoint_freq_seconds(mut self, seconds: u64) -> Self {
    self.checkpoint_freq_seconds = seconds;
    self
  }

  /// Writes logs to `path` instead of stderr.
  pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.log_file_name = Some(path.into());
    self
  }

  /// Sets the maximum log level.
  pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
    self.log_level = level.into();
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = ProcessConfig::default();
    assert_eq!(config.checkpoint_retries, 5);
    assert_eq!(config.checkpoint_freq_seconds, 60);
    assert_eq!(config.level().unwrap(), tracing::Level::INFO);
    assert_eq!(
      config.checkpoint_policy(),
      CheckpointPolicy::new(Duration::from_secs(60), 5)
    );
  }

  #[test]
  fn test_from_json_fills_missing_keys_with_defaults() {
    let config = ProcessConfig::from_json(
      r#"{"streamName":"orders","checkpointRetries":2,"outputFileName":"/tmp/out"}"#,
    )
    .unwrap();

    assert_eq!(config.stream_name.as_deref(), Some("orders"));
    assert_eq!(config.checkpoint_retries, 2);
    assert_eq!(config.checkpoint_freq_seconds, 60);
    assert_eq!(config.output_file_name, Some(PathBuf::from("/tmp/out")));
    assert_eq!(config.input_file_name, None);
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kcl.json");
    std::fs::write(&path, r#"{"checkpointFreqSeconds":5,"logLevel":"debug"}"#).unwrap();

    let config = ProcessConfig::load(&path).unwrap();

    assert_eq!(config.checkpoint_policy().interval, Duration::from_secs(5));
    assert_eq!(config.level().unwrap(), tracing::Level::DEBUG);
  }

  #[test]
  fn test_load_missing_file() {
    let err = ProcessConfig::load("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }

  #[test]
  fn test_invalid_values_are_rejected() {
    assert!(matches!(
      ProcessConfig::from_json(r#"{"logLevel":"loud"}"#),
      Err(ConfigError::Invalid { key: "logLevel", .. })
    ));
    assert!(matches!(
      ProcessConfig::from_json(r#"{"checkpointRetries":"many"}"#),
      Err(ConfigError::Parse(_))
    ));
  }

  #[test]
  fn test_builders() {
    let config = ProcessConfig::default()
      .with_stream_name("s")
      .with_checkpoint_retries(1)
      .with_checkpoint_freq_seconds(10)
      .with_log_level("warn")
      .with_log_file("/tmp/kcl.log");

    assert_eq!(config.stream_name.as_deref(), Some("s"));
    assert_eq!(config.checkpoint_policy(), CheckpointPolicy::new(Duration::from_secs(10), 1));
    assert_eq!(config.level().unwrap(), tracing::Level::WARN);
    assert_eq!(config.log_file_name, Some(PathBuf::from("/tmp/kcl.log")));
  }
}
