//! Record processing lifecycle.
//!
//! The dispatch loop drives a [`RecordProcessor`] through
//! `initialize → process_records* → shutdown`, with `shutdown_requested`
//! possible at any point. Every callback receives a [`Checkpointer`] so user
//! code can checkpoint whenever it likes.
//!
//! Most users only need per-record logic: implement [`RecordHandler`] (or
//! pass a closure) and wrap it in a [`DefaultRecordProcessor`], which tracks
//! the high-water-mark and checkpoints on a timer.

use crate::checkpoint::{CheckpointErrorKind, Checkpointer};
use crate::error::{BoxError, ProcessorError};
use crate::message::{InitializeInput, ProcessRecordsInput, Record, ShutdownInput, ShutdownReason};
use crate::policy::CheckpointPolicy;
use crate::sequence::SequenceTracker;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Callbacks for one shard lease.
#[async_trait]
pub trait RecordProcessor: Send {
  /// A shard lease starts.
  async fn initialize(
    &mut self,
    input: &InitializeInput,
    checkpointer: &dyn Checkpointer,
  ) -> Result<(), ProcessorError>;

  /// A batch of records was delivered.
  async fn process_records(
    &mut self,
    input: &ProcessRecordsInput,
    checkpointer: &dyn Checkpointer,
  ) -> Result<(), ProcessorError>;

  /// The shard lease ended.
  async fn shutdown(
    &mut self,
    input: &ShutdownInput,
    checkpointer: &dyn Checkpointer,
  ) -> Result<(), ProcessorError>;

  /// The worker is shutting down gracefully.
  async fn shutdown_requested(&mut self, checkpointer: &dyn Checkpointer) -> Result<(), ProcessorError>;
}

/// Per-record business logic.
#[async_trait]
pub trait RecordHandler: Send {
  /// Handles one record. An error stops the batch.
  async fn handle(&mut self, record: &Record) -> Result<(), BoxError>;
}

#[async_trait]
impl<F> RecordHandler for F
where
  F: FnMut(&Record) -> Result<(), BoxError> + Send,
{
  async fn handle(&mut self, record: &Record) -> Result<(), BoxError> {
    (self)(record)
  }
}

/// Handler that logs each record's payload.
#[derive(Clone, Debug, Default)]
pub struct LoggingRecordHandler {
  handled: u64,
}

impl LoggingRecordHandler {
  /// Creates the handler.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of records handled so far.
  pub fn handled(&self) -> u64 {
    self.handled
  }
}

#[async_trait]
impl RecordHandler for LoggingRecordHandler {
  async fn handle(&mut self, record: &Record) -> Result<(), BoxError> {
    let data = record.binary_data()?;
    info!(
      partition_key = %record.partition_key,
      sequence_number = %record.sequence_number,
      data = %String::from_utf8_lossy(&data),
      "Received record"
    );
    self.handled += 1;
    Ok(())
  }
}

/// [`RecordProcessor`] that runs a [`RecordHandler`] per record and
/// checkpoints the high-water-mark on a timer.
#[derive(Debug)]
pub struct DefaultRecordProcessor<H> {
  handler: H,
  tracker: SequenceTracker,
  shard_id: Option<String>,
}

impl<H: RecordHandler> DefaultRecordProcessor<H> {
  /// Creates a processor with the given checkpoint policy.
  pub fn new(policy: CheckpointPolicy, handler: H) -> Self {
    Self {
      handler,
      tracker: SequenceTracker::new(policy),
      shard_id: None,
    }
  }

  /// The wrapped handler.
  pub fn handler(&self) -> &H {
    &self.handler
  }

  /// The sequence tracker.
  pub fn tracker(&self) -> &SequenceTracker {
    &self.tracker
  }

  /// Shard currently leased, once initialized.
  pub fn shard_id(&self) -> Option<&str> {
    self.shard_id.as_deref()
  }

  /// Makes one checkpoint attempt at the latest delivered record. Fatal
  /// errors are returned, anything else is logged and swallowed.
  async fn checkpoint_latest(&mut self, checkpointer: &dyn Checkpointer) -> Result<(), ProcessorError> {
    match checkpointer.checkpoint(None).await {
      Ok(()) => Ok(()),
      Err(e) if e.is_fatal() => Err(e.into()),
      Err(e) => {
        warn!(shard_id = ?self.shard_id, error = %e, "Checkpoint failed");
        Ok(())
      }
    }
  }
}

#[async_trait]
impl<H: RecordHandler> RecordProcessor for DefaultRecordProcessor<H> {
  async fn initialize(
    &mut self,
    input: &InitializeInput,
    _checkpointer: &dyn Checkpointer,
  ) -> Result<(), ProcessorError> {
    info!(
      shard_id = %input.shard_id,
      sequence_number = ?input.sequence_number,
      "Processing shard"
    );
    self.shard_id = Some(input.shard_id.clone());
    self.tracker.reset();
    Ok(())
  }

  async fn process_records(
    &mut self,
    input: &ProcessRecordsInput,
    checkpointer: &dyn Checkpointer,
  ) -> Result<(), ProcessorError> {
    debug!(
      records = input.records.len(),
      millis_behind_latest = input.millis_behind_latest,
      "Processing records"
    );

    for record in &input.records {
      let position = record.position()?;
      self
        .handler
        .handle(record)
        .await
        .map_err(|e| ProcessorError::handler(record.sequence_number.clone(), e))?;
      self.tracker.observe(position);
    }

    match self.tracker.maybe_auto_checkpoint(checkpointer).await {
      Ok(_) => Ok(()),
      Err(e) if e.is_fatal() => Err(e.into()),
      Err(e) => {
        if e.kind() == Some(&CheckpointErrorKind::Shutdown) {
          info!(shard_id = ?self.shard_id, "Lease lost, skipping checkpoint");
        } else {
          warn!(shard_id = ?self.shard_id, error = %e, "Automatic checkpoint failed, will retry after next batch");
        }
        Ok(())
      }
    }
  }

  async fn shutdown(
    &mut self,
    input: &ShutdownInput,
    checkpointer: &dyn Checkpointer,
  ) -> Result<(), ProcessorError> {
    match &input.reason {
      ShutdownReason::Zombie => {
        info!(shard_id = ?self.shard_id, "Shutting down due to failover, will not checkpoint");
        Ok(())
      }
      ShutdownReason::Terminate => {
        info!(shard_id = ?self.shard_id, "Was told to terminate, will attempt to checkpoint");
        self.checkpoint_latest(checkpointer).await
      }
      ShutdownReason::Unknown(reason) => {
        error!(shard_id = ?self.shard_id, reason = %reason, "Unknown shutdown reason, will not checkpoint");
        Ok(())
      }
    }
  }

  async fn shutdown_requested(&mut self, checkpointer: &dyn Checkpointer) -> Result<(), ProcessorError> {
    info!(shard_id = ?self.shard_id, "Was told to gracefully shutdown, will attempt to checkpoint");
    self.checkpoint_latest(checkpointer).await
  }
}
