//! Protocol messages exchanged with the coordinator.
//!
//! # Overview
//!
//! Inbound lines decode into one [`Action`]. Outbound lines are either an
//! [`ActionResponse`] acknowledging an action or a [`CheckpointRequest`];
//! both are wrapped in [`OutboundMessage`], the only type the codec encodes.
//!
//! ```text
//! {"action":"initialize","shardId":"shardId-000001","sequenceNumber":"TRIM_HORIZON","subSequenceNumber":0}
//! {"action":"processRecords","millisBehindLatest":0,"records":[...]}
//! {"action":"shutdown","reason":"TERMINATE"}
//! {"action":"shutdownRequested"}
//! {"action":"checkpoint","error":"ThrottlingException"}
//! ```

use crate::checkpoint::{CheckpointError, CheckpointErrorKind};
use crate::sequence::{SequenceError, SequencePosition};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Discriminator of the acknowledgment line.
pub const STATUS_ACTION: &str = "status";

/// Discriminator of every inbound action.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ActionKind {
  /// `initialize`
  Initialize,
  /// `processRecords`
  ProcessRecords,
  /// `shutdown`
  Shutdown,
  /// `shutdownRequested`
  ShutdownRequested,
  /// `checkpoint`, the response to a checkpoint request.
  Checkpoint,
}

impl ActionKind {
  /// All inbound kinds.
  pub const ALL: [ActionKind; 5] = [
    ActionKind::Initialize,
    ActionKind::ProcessRecords,
    ActionKind::Shutdown,
    ActionKind::ShutdownRequested,
    ActionKind::Checkpoint,
  ];

  /// The wire string for this kind.
  pub const fn as_str(self) -> &'static str {
    match self {
      ActionKind::Initialize => "initialize",
      ActionKind::ProcessRecords => "processRecords",
      ActionKind::Shutdown => "shutdown",
      ActionKind::ShutdownRequested => "shutdownRequested",
      ActionKind::Checkpoint => "checkpoint",
    }
  }
}

impl Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ActionKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ActionKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| format!("unknown action `{}`", s))
  }
}

/// One decoded coordinator action.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
  /// Start of a shard lease.
  Initialize(InitializeInput),
  /// A batch of records.
  ProcessRecords(ProcessRecordsInput),
  /// End of a shard lease.
  Shutdown(ShutdownInput),
  /// Graceful shutdown of the worker.
  ShutdownRequested(ShutdownRequestedInput),
  /// Response to a checkpoint request.
  Checkpoint(CheckpointResponse),
}

impl Action {
  /// Returns the discriminator of this action.
  pub fn kind(&self) -> ActionKind {
    match self {
      Action::Initialize(_) => ActionKind::Initialize,
      Action::ProcessRecords(_) => ActionKind::ProcessRecords,
      Action::Shutdown(_) => ActionKind::Shutdown,
      Action::ShutdownRequested(_) => ActionKind::ShutdownRequested,
      Action::Checkpoint(_) => ActionKind::Checkpoint,
    }
  }
}

/// Payload of `initialize`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeInput {
  /// Shard this processor is now responsible for.
  pub shard_id: String,
  /// Where processing resumes. Either a decimal sequence number or a
  /// sentinel such as `TRIM_HORIZON` or `LATEST`.
  #[serde(default)]
  pub sequence_number: Option<String>,
  /// Sub-sequence number paired with `sequence_number`.
  #[serde(default)]
  pub sub_sequence_number: Option<u64>,
}

impl InitializeInput {
  /// Returns the resume position when the coordinator sent a numeric one.
  pub fn start_position(&self) -> Option<SequencePosition> {
    let sequence = self.sequence_number.as_deref()?;
    SequencePosition::parse(sequence, self.sub_sequence_number.unwrap_or(0)).ok()
  }
}

/// Payload of `processRecords`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecordsInput {
  /// Records in delivery order.
  #[serde(default)]
  pub records: Vec<Record>,
  /// How far behind the tip of the shard this batch is.
  #[serde(default)]
  pub millis_behind_latest: u64,
}

/// Why a shard lease ended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShutdownReason {
  /// Lease lost to another worker. Must not checkpoint.
  Zombie,
  /// Shard ended or was closed. Should checkpoint.
  Terminate,
  /// Any reason this library does not know about.
  Unknown(String),
}

impl From<String> for ShutdownReason {
  fn from(reason: String) -> Self {
    match reason.as_str() {
      "ZOMBIE" => ShutdownReason::Zombie,
      "TERMINATE" => ShutdownReason::Terminate,
      _ => ShutdownReason::Unknown(reason),
    }
  }
}

impl From<ShutdownReason> for String {
  fn from(reason: ShutdownReason) -> Self {
    reason.to_string()
  }
}

impl Display for ShutdownReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShutdownReason::Zombie => f.write_str("ZOMBIE"),
      ShutdownReason::Terminate => f.write_str("TERMINATE"),
      ShutdownReason::Unknown(reason) => f.write_str(reason),
    }
  }
}

/// Payload of `shutdown`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShutdownInput {
  /// Why the lease ended.
  pub reason: ShutdownReason,
}

/// Payload of `shutdownRequested`. Carries nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownRequestedInput {}

/// One delivered record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  /// Base64 encoded payload.
  pub data: String,
  /// Partition key the producer used.
  #[serde(default)]
  pub partition_key: String,
  /// Decimal sequence number. May not fit in 64 bits.
  pub sequence_number: String,
  /// Position within an aggregated record.
  #[serde(default)]
  pub sub_sequence_number: u64,
  /// Arrival time at the stream, in epoch seconds.
  #[serde(default)]
  pub approximate_arrival_timestamp: i64,
}

impl Record {
  /// Decodes the payload.
  pub fn binary_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(&self.data)
  }

  /// Arrival time as a timestamp, or `None` when out of range.
  pub fn approximate_arrival_time(&self) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(self.approximate_arrival_timestamp, 0)
  }

  /// Parses this record's sequence position.
  pub fn position(&self) -> Result<SequencePosition, SequenceError> {
    SequencePosition::parse(&self.sequence_number, self.sub_sequence_number)
  }
}

/// Response to a checkpoint request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointResponse {
  /// Coordinator error string, e.g. `ThrottlingException`.
  #[serde(default)]
  pub error: Option<String>,
  /// Position that was committed.
  #[serde(default)]
  pub sequence_number: Option<String>,
  /// Sub-sequence number that was committed.
  #[serde(default)]
  pub sub_sequence_number: Option<u64>,
}

impl CheckpointResponse {
  /// Outcome carried by this response.
  pub fn result(&self) -> Result<(), CheckpointError> {
    match &self.error {
      Some(error) => Err(CheckpointError::Coordinator(CheckpointErrorKind::from(
        error.as_str(),
      ))),
      None => Ok(()),
    }
  }
}

/// Acknowledgment sent after an action was handled. Encoded with the
/// [`STATUS_ACTION`] discriminator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionResponse {
  /// The action being acknowledged.
  pub response_for: String,
}

impl ActionResponse {
  /// Builds the acknowledgment for `kind`.
  pub fn for_action(kind: ActionKind) -> Self {
    Self {
      response_for: kind.as_str().to_string(),
    }
  }
}

/// Request to durably record progress. Encoded with the `checkpoint`
/// discriminator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckpointRequest {
  /// Position to record; `None` means the latest delivered record.
  pub sequence_number: Option<String>,
  /// Sub-sequence number; 0 when `sequence_number` is `None`.
  pub sub_sequence_number: u64,
}

impl CheckpointRequest {
  /// Builds a request for `position`, or for the latest delivered record.
  pub fn at(position: Option<&SequencePosition>) -> Self {
    Self {
      sequence_number: position.map(|p| p.sequence_number().to_string()),
      sub_sequence_number: position.map_or(0, SequencePosition::sub_sequence_number),
    }
  }
}

/// Everything this library ever writes to the protocol stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutboundMessage {
  /// Acknowledgment.
  Status(ActionResponse),
  /// Checkpoint request.
  Checkpoint(CheckpointRequest),
}
