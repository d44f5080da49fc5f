//! Sequence positions and high-water-mark tracking.
//!
//! Kinesis sequence numbers are decimal strings that routinely exceed
//! `u64::MAX`, so positions hold a [`BigUint`]. The tracker keeps the greatest
//! position handled so far for the current shard and decides when an
//! automatic checkpoint is due.

use crate::checkpoint::{CheckpointError, Checkpointer};
use crate::policy::CheckpointPolicy;
use num_bigint::BigUint;
use num_traits::Num;
use std::fmt::{self, Display};
use thiserror::Error;
use tokio::time::Instant;

/// Error type for sequence number parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
  /// The sequence number is not a non-negative decimal integer.
  #[error("sequence number `{0}` is not a decimal integer")]
  InvalidSequenceNumber(String),
}

/// A point in a shard's record order.
///
/// Ordered by sequence number first and sub-sequence number second.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SequencePosition {
  sequence_number: BigUint,
  sub_sequence_number: u64,
}

impl SequencePosition {
  /// Creates a position from already parsed parts.
  pub fn new(sequence_number: BigUint, sub_sequence_number: u64) -> Self {
    Self {
      sequence_number,
      sub_sequence_number,
    }
  }

  /// Parses a decimal sequence number of any length.
  pub fn parse(sequence_number: &str, sub_sequence_number: u64) -> Result<Self, SequenceError> {
    if sequence_number.is_empty() || !sequence_number.bytes().all(|b| b.is_ascii_digit()) {
      return Err(SequenceError::InvalidSequenceNumber(sequence_number.to_string()));
    }
    let sequence_number = BigUint::from_str_radix(sequence_number, 10)
      .map_err(|_| SequenceError::InvalidSequenceNumber(sequence_number.to_string()))?;
    Ok(Self::new(sequence_number, sub_sequence_number))
  }

  /// The sequence number.
  pub fn sequence_number(&self) -> &BigUint {
    &self.sequence_number
  }

  /// The sub-sequence number.
  pub fn sub_sequence_number(&self) -> u64 {
    self.sub_sequence_number
  }
}

impl Display for SequencePosition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.sequence_number, self.sub_sequence_number)
  }
}

/// Tracks the high-water-mark for one shard and the auto-checkpoint timer.
#[derive(Debug)]
pub struct SequenceTracker {
  mark: Option<SequencePosition>,
  last_checkpoint: Instant,
  policy: CheckpointPolicy,
}

impl SequenceTracker {
  /// Creates a tracker with no mark; the timer starts now.
  pub fn new(policy: CheckpointPolicy) -> Self {
    Self {
      mark: None,
      last_checkpoint: Instant::now(),
      policy,
    }
  }

  /// Forgets the mark and restarts the timer, for a new shard lease.
  pub fn reset(&mut self) {
    self.mark = None;
    self.last_checkpoint = Instant::now();
  }

  /// The greatest position observed since the last reset.
  pub fn mark(&self) -> Option<&SequencePosition> {
    self.mark.as_ref()
  }

  /// The checkpoint policy in use.
  pub fn policy(&self) -> &CheckpointPolicy {
    &self.policy
  }

  /// Records that `position` has been handled. The mark only moves forward;
  /// returns whether it moved.
  pub fn observe(&mut self, position: SequencePosition) -> bool {
    let advances = match &self.mark {
      None => true,
      Some(mark) => position > *mark,
    };
    if advances {
      self.mark = Some(position);
    }
    advances
  }

  /// Returns true once the checkpoint interval has elapsed.
  pub fn checkpoint_due(&self) -> bool {
    self.last_checkpoint.elapsed() >= self.policy.interval
  }

  /// Checkpoints at the mark if the interval has elapsed.
  ///
  /// Returns whether a checkpoint was committed. Nothing is sent while no
  /// record has been observed.
  pub async fn maybe_auto_checkpoint(
    &mut self,
    checkpointer: &dyn Checkpointer,
  ) -> Result<bool, CheckpointError> {
    if !self.checkpoint_due() {
      return Ok(false);
    }
    let Some(mark) = self.mark.clone() else {
      tracing::debug!("Checkpoint interval elapsed but no records observed yet");
      return Ok(false);
    };
    self.checkpoint(checkpointer, Some(&mark)).await?;
    Ok(true)
  }

  /// Checkpoints at `position` (or at the latest delivered record) with the
  /// policy's retries, restarting the timer on success.
  pub async fn checkpoint(
    &mut self,
    checkpointer: &dyn Checkpointer,
    position: Option<&SequencePosition>,
  ) -> Result<(), CheckpointError> {
    self.policy.checkpoint_with_retry(checkpointer, position).await?;
    self.last_checkpoint = Instant::now();
    Ok(())
  }
}
