//! Errors raised by record processors.
//!
//! Component-level errors live next to their components
//! ([`TransportError`](crate::transport::TransportError),
//! [`CodecError`](crate::codec::CodecError),
//! [`CheckpointError`](crate::checkpoint::CheckpointError),
//! [`SequenceError`](crate::sequence::SequenceError)). This module holds the
//! error a lifecycle callback returns to the dispatch loop, which decides
//! from it whether to acknowledge the action and whether to keep running.

use crate::checkpoint::CheckpointError;
use crate::sequence::SequenceError;
use thiserror::Error;

/// Boxed error returned by user record handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned from a [`RecordProcessor`](crate::processor::RecordProcessor)
/// callback.
#[derive(Error, Debug)]
pub enum ProcessorError {
  /// The user handler failed on a record.
  #[error("record handler failed at sequence number {sequence_number}: {source}")]
  Handler {
    /// Sequence number of the failing record.
    sequence_number: String,
    /// The handler's error.
    #[source]
    source: BoxError,
  },
  /// A delivered record carried an unparsable sequence number.
  #[error(transparent)]
  Sequence(#[from] SequenceError),
  /// A checkpoint failed.
  #[error(transparent)]
  Checkpoint(#[from] CheckpointError),
  /// Any other failure reported by a custom processor.
  #[error("{0}")]
  Other(String),
}

impl ProcessorError {
  /// Wraps a handler failure for the record at `sequence_number`.
  pub fn handler(sequence_number: impl Into<String>, source: impl Into<BoxError>) -> Self {
    ProcessorError::Handler {
      sequence_number: sequence_number.into(),
      source: source.into(),
    }
  }

  /// True when the process should stop rather than wait for the next action.
  pub fn is_fatal(&self) -> bool {
    matches!(self, ProcessorError::Checkpoint(e) if e.is_fatal())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::checkpoint::CheckpointErrorKind;

  #[test]
  fn test_only_invalid_state_is_fatal() {
    let fatal = ProcessorError::from(CheckpointError::Coordinator(CheckpointErrorKind::InvalidState));
    assert!(fatal.is_fatal());

    let throttled = ProcessorError::from(CheckpointError::Coordinator(CheckpointErrorKind::Throttling));
    assert!(!throttled.is_fatal());

    let handler = ProcessorError::handler("42", "bad record");
    assert!(!handler.is_fatal());
    assert_eq!(
      handler.to_string(),
      "record handler failed at sequence number 42: bad record"
    );
  }

  #[test]
  fn test_sequence_error_is_transparent() {
    let err = ProcessorError::from(SequenceError::InvalidSequenceNumber("abc".to_string()));
    assert_eq!(err.to_string(), "sequence number `abc` is not a decimal integer");
  }
}
