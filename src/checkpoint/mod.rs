//! Checkpoint request/response sub-protocol.
//!
//! A checkpoint is a nested, synchronous exchange: one request line out, one
//! response line in, issued from inside the handling of another action. The
//! coordinator never pipelines, so at most one request is outstanding.

#[cfg(test)]
mod client_test;

use crate::codec::{self, CodecError};
use crate::message::{Action, CheckpointRequest, OutboundMessage};
use crate::sequence::SequencePosition;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::fmt::{self, Display};
use std::sync::Arc;
use thiserror::Error;

const SHUTDOWN_EXCEPTION: &str = "ShutdownException";
const THROTTLING_EXCEPTION: &str = "ThrottlingException";
const INVALID_STATE_EXCEPTION: &str = "InvalidStateException";

/// Coordinator-reported checkpoint failure, matched on its literal string.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CheckpointErrorKind {
  /// `ShutdownException`: the lease was lost.
  Shutdown,
  /// `ThrottlingException`: transient, retry later.
  Throttling,
  /// `InvalidStateException`: the protocol is desynchronised.
  InvalidState,
  /// Any other string.
  Other(String),
}

impl CheckpointErrorKind {
  /// The literal coordinator string.
  pub fn as_str(&self) -> &str {
    match self {
      CheckpointErrorKind::Shutdown => SHUTDOWN_EXCEPTION,
      CheckpointErrorKind::Throttling => THROTTLING_EXCEPTION,
      CheckpointErrorKind::InvalidState => INVALID_STATE_EXCEPTION,
      CheckpointErrorKind::Other(other) => other,
    }
  }
}

impl From<&str> for CheckpointErrorKind {
  fn from(error: &str) -> Self {
    match error {
      SHUTDOWN_EXCEPTION => CheckpointErrorKind::Shutdown,
      THROTTLING_EXCEPTION => CheckpointErrorKind::Throttling,
      INVALID_STATE_EXCEPTION => CheckpointErrorKind::InvalidState,
      other => CheckpointErrorKind::Other(other.to_string()),
    }
  }
}

impl Display for CheckpointErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error type for checkpoint operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
  /// The coordinator rejected the checkpoint.
  #[error("checkpoint rejected: {0}")]
  Coordinator(CheckpointErrorKind),
  /// Writing the request or reading the response failed.
  #[error("transport error: {0}")]
  Transport(#[from] TransportError),
  /// The response line could not be decoded.
  #[error("codec error: {0}")]
  Codec(#[from] CodecError),
}

impl CheckpointError {
  /// The coordinator error kind, if the coordinator produced this error.
  pub fn kind(&self) -> Option<&CheckpointErrorKind> {
    match self {
      CheckpointError::Coordinator(kind) => Some(kind),
      _ => None,
    }
  }

  /// True for `InvalidStateException`, after which the process should exit.
  pub fn is_fatal(&self) -> bool {
    matches!(self.kind(), Some(CheckpointErrorKind::InvalidState))
  }
}

/// Capability to checkpoint, handed to record processors.
#[async_trait]
pub trait Checkpointer: Send + Sync {
  /// Checkpoints at `position`, or at the latest delivered record when
  /// `None`. A single attempt; no retries.
  async fn checkpoint(&self, position: Option<&SequencePosition>) -> Result<(), CheckpointError>;
}

/// [`Checkpointer`] that speaks the protocol over a [`Transport`].
#[derive(Clone, Debug)]
pub struct CheckpointClient {
  transport: Arc<Transport>,
}

impl CheckpointClient {
  /// Creates a client sharing `transport` with the dispatch loop.
  pub fn new(transport: Arc<Transport>) -> Self {
    Self { transport }
  }
}

#[async_trait]
impl Checkpointer for CheckpointClient {
  async fn checkpoint(&self, position: Option<&SequencePosition>) -> Result<(), CheckpointError> {
    let request = CheckpointRequest::at(position);
    tracing::debug!(
      sequence_number = ?request.sequence_number,
      sub_sequence_number = request.sub_sequence_number,
      "Sending checkpoint request"
    );
    self
      .transport
      .write_line(&codec::encode(&OutboundMessage::Checkpoint(request)))
      .await?;

    let line = self.transport.read_line().await?;
    match codec::decode(&line)? {
      Action::Checkpoint(response) => response.result(),
      other => {
        tracing::error!(
          action = %other.kind(),
          "Expected a checkpoint response, protocol is out of step"
        );
        Err(CheckpointError::Coordinator(CheckpointErrorKind::InvalidState))
      }
    }
  }
}
