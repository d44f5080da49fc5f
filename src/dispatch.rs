//! The dispatch loop.
//!
//! Reads one line at a time, decodes it, routes it to the record processor
//! and acknowledges it. The coordinator is strictly request/response, so
//! everything runs on one task; checkpoints issued from inside a callback
//! read their response from the same input before control returns here.

use crate::checkpoint::CheckpointClient;
use crate::codec;
use crate::error::ProcessorError;
use crate::message::{Action, ActionKind, ActionResponse, OutboundMessage};
use crate::processor::RecordProcessor;
use crate::transport::{Transport, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Error that ends the dispatch loop.
#[derive(Error, Debug)]
pub enum DispatchError {
  /// The streams can no longer be used.
  #[error("transport failure: {0}")]
  Transport(#[from] TransportError),
  /// A callback reported an error the process cannot recover from.
  #[error("fatal processor error: {0}")]
  Fatal(#[source] ProcessorError),
}

/// What happened to one inbound line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dispatch {
  /// The line was blank or could not be decoded; nothing was dispatched.
  Malformed,
  /// The callback failed; no acknowledgment was sent.
  Rejected(ActionKind),
  /// Handled and, by protocol, not acknowledged (checkpoint responses).
  Completed(ActionKind),
  /// Handled and acknowledged.
  Acknowledged(ActionKind),
}

/// Drives a [`RecordProcessor`] from the coordinator's command stream.
pub struct Dispatcher<P> {
  transport: Arc<Transport>,
  checkpointer: CheckpointClient,
  processor: P,
}

impl<P: RecordProcessor> Dispatcher<P> {
  /// Creates a dispatcher; checkpoints go over the same transport.
  pub fn new(transport: Arc<Transport>, processor: P) -> Self {
    Self {
      checkpointer: CheckpointClient::new(Arc::clone(&transport)),
      transport,
      processor,
    }
  }

  /// The processor being driven.
  pub fn processor(&self) -> &P {
    &self.processor
  }

  /// Consumes the dispatcher, returning the processor.
  pub fn into_processor(self) -> P {
    self.processor
  }

  /// Runs until the input ends or an unrecoverable error occurs, then
  /// closes the transport.
  pub async fn run(&mut self) -> Result<(), DispatchError> {
    let result = self.run_loop().await;
    if let Err(e) = self.transport.cleanup().await {
      warn!(error = %e, "Failed to close transport");
    }
    result
  }

  async fn run_loop(&mut self) -> Result<(), DispatchError> {
    loop {
      let line = match self.transport.read_line().await {
        Ok(line) => line,
        Err(TransportError::Closed) => return Err(DispatchError::Transport(TransportError::Closed)),
        Err(e) => {
          error!(error = %e, "Error reading line");
          continue;
        }
      };
      if line.is_empty() {
        info!("Input stream ended, stopping");
        return Ok(());
      }
      self.handle_line(&line).await?;
    }
  }

  /// Dispatches one inbound line.
  pub async fn handle_line(&mut self, line: &str) -> Result<Dispatch, DispatchError> {
    if line.trim().is_empty() {
      return Ok(Dispatch::Malformed);
    }

    let action = match codec::decode(line) {
      Ok(action) => action,
      Err(e) => {
        error!(error = %e, "Error decoding line");
        report(&self.transport, &format!("Error decoding line: {}", e)).await;
        return Ok(Dispatch::Malformed);
      }
    };

    let kind = action.kind();
    debug!(action = %kind, "Dispatching action");

    if let Err(e) = self.perform_action(action).await {
      error!(action = %kind, error = %e, "Error performing action");
      report(&self.transport, &format!("Error performing {}: {}", kind, e)).await;
      if e.is_fatal() {
        return Err(DispatchError::Fatal(e));
      }
      return Ok(Dispatch::Rejected(kind));
    }

    // Acknowledging a checkpoint response would put an unexpected line in
    // the middle of the coordinator's checkpoint exchange.
    if kind == ActionKind::Checkpoint {
      return Ok(Dispatch::Completed(kind));
    }

    let ack = OutboundMessage::Status(ActionResponse::for_action(kind));
    self.transport.write_line(&codec::encode(&ack)).await?;
    Ok(Dispatch::Acknowledged(kind))
  }

  async fn perform_action(&mut self, action: Action) -> Result<(), ProcessorError> {
    let checkpointer = &self.checkpointer;
    match action {
      Action::Initialize(input) => self.processor.initialize(&input, checkpointer).await,
      Action::ProcessRecords(input) => self.processor.process_records(&input, checkpointer).await,
      Action::Shutdown(input) => self.processor.shutdown(&input, checkpointer).await,
      Action::ShutdownRequested(_) => self.processor.shutdown_requested(checkpointer).await,
      Action::Checkpoint(response) => Ok(response.result()?),
    }
  }
}

async fn report(transport: &Transport, message: &str) {
  if let Err(e) = transport.write_error(message).await {
    warn!(error = %e, "Failed to write diagnostic line");
  }
}
