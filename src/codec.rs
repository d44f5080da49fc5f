//! Line codec for the coordinator protocol.
//!
//! Decoding parses the line once into a [`serde_json::Value`], reads the
//! `action` discriminator from the parsed object and converts the same value
//! into the typed payload. The discriminator is located structurally, so a
//! string field containing `,` or `"action"` ahead of the real discriminator
//! cannot confuse it, and the cost stays linear in the line length for large
//! record batches.

use crate::message::{Action, ActionKind, OutboundMessage, STATUS_ACTION};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

/// Error type for decoding inbound lines.
#[derive(Error, Debug)]
pub enum CodecError {
  /// The line has no recognisable action discriminator.
  #[error("malformed action: {0}")]
  MalformedAction(String),
  /// The discriminator is known but the payload does not match it.
  #[error("invalid `{action}` payload: {source}")]
  InvalidPayload {
    /// Action the payload claimed to be.
    action: ActionKind,
    /// Underlying deserialization failure.
    #[source]
    source: serde_json::Error,
  },
}

/// Decodes one inbound line into an [`Action`].
pub fn decode(line: &str) -> Result<Action, CodecError> {
  let value: Value = serde_json::from_str(line.trim())
    .map_err(|e| CodecError::MalformedAction(format!("line is not json: {}", e)))?;

  let kind = value
    .get("action")
    .and_then(Value::as_str)
    .ok_or_else(|| CodecError::MalformedAction("missing `action` discriminator".to_string()))?
    .parse::<ActionKind>()
    .map_err(CodecError::MalformedAction)?;

  Ok(match kind {
    ActionKind::Initialize => Action::Initialize(payload(kind, value)?),
    ActionKind::ProcessRecords => Action::ProcessRecords(payload(kind, value)?),
    ActionKind::Shutdown => Action::Shutdown(payload(kind, value)?),
    ActionKind::ShutdownRequested => Action::ShutdownRequested(payload(kind, value)?),
    ActionKind::Checkpoint => Action::Checkpoint(payload(kind, value)?),
  })
}

fn payload<T: DeserializeOwned>(action: ActionKind, value: Value) -> Result<T, CodecError> {
  serde_json::from_value(value).map_err(|source| CodecError::InvalidPayload { action, source })
}

/// Encodes one outbound message as a single line, without framing.
pub fn encode(message: &OutboundMessage) -> String {
  let value = match message {
    OutboundMessage::Status(response) => json!({
      "action": STATUS_ACTION,
      "responseFor": response.response_for,
    }),
    OutboundMessage::Checkpoint(request) => json!({
      "action": ActionKind::Checkpoint.as_str(),
      "sequenceNumber": request.sequence_number,
      "subSequenceNumber": request.sub_sequence_number,
    }),
  };
  value.to_string()
}
