//! Checkpoint cadence and retry policy.
//!
//! The coordinator reports checkpoint failures as plain strings. What to do
//! about each one is decided here:
//!
//! - `ShutdownException`: the lease is gone. Stop, do not retry.
//! - `InvalidStateException`: the protocol is out of step. Stop; the caller
//!   is expected to terminate the process.
//! - `ThrottlingException` and anything unrecognised: sleep for the
//!   checkpoint interval and try again while retries remain.

use crate::checkpoint::{CheckpointError, CheckpointErrorKind, Checkpointer};
use crate::sequence::SequencePosition;
use std::time::Duration;
use tracing::{error, info, warn};

/// How often to checkpoint and how hard to try.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckpointPolicy {
  /// Minimum time between automatic checkpoints; also the wait between
  /// retries.
  pub interval: Duration,
  /// Attempts per checkpoint. Zero is treated as one.
  pub retries: u32,
}

impl CheckpointPolicy {
  /// Creates a policy.
  pub fn new(interval: Duration, retries: u32) -> Self {
    Self { interval, retries }
  }

  /// Sets the interval.
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  /// Sets the retry budget.
  pub fn with_retries(mut self, retries: u32) -> Self {
    self.retries = retries;
    self
  }

  /// Checkpoints through `checkpointer`, retrying per the rules above.
  ///
  /// Returns on the first success. When the budget runs out the last error
  /// is returned.
  pub async fn checkpoint_with_retry(
    &self,
    checkpointer: &dyn Checkpointer,
    position: Option<&SequencePosition>,
  ) -> Result<(), CheckpointError> {
    let attempts = self.retries.max(1);
    let mut attempt = 0;

    loop {
      attempt += 1;
      let err = match checkpointer.checkpoint(position).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
      };
      let exhausted = attempt >= attempts;

      match err.kind().cloned() {
        Some(CheckpointErrorKind::Shutdown) => {
          info!("Encountered ShutdownException, skipping checkpoint");
          return Err(err);
        }
        Some(CheckpointErrorKind::InvalidState) => {
          error!("Received InvalidStateException, client code should exit now");
          return Err(err);
        }
        Some(CheckpointErrorKind::Throttling) if exhausted => {
          error!(attempts = attempt, "Failed to checkpoint after repeated throttling, giving up");
          return Err(err);
        }
        Some(CheckpointErrorKind::Throttling) => {
          warn!(
            attempt,
            retry_in = ?self.interval,
            "Was throttled while checkpointing, will retry"
          );
        }
        _ if exhausted => {
          error!(attempts = attempt, error = %err, "Failed to checkpoint, giving up");
          return Err(err);
        }
        _ => {
          warn!(attempt, error = %err, "Received error when trying to checkpoint, will retry");
        }
      }

      tokio::time::sleep(self.interval).await;
    }
  }
}

impl Default for CheckpointPolicy {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(60),
      retries: 5,
    }
  }
}
