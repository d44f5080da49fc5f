//! Test doubles shared by the unit tests.

use crate::checkpoint::{CheckpointError, Checkpointer};
use crate::sequence::SequencePosition;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// In-memory writer whose contents stay readable after the transport that
/// owns it is closed.
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
  pub(crate) fn contents(&self) -> String {
    String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
  }

  /// Non-empty lines, i.e. protocol lines with their framing removed.
  pub(crate) fn lines(&self) -> Vec<String> {
    self
      .contents()
      .lines()
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect()
  }
}

impl AsyncWrite for SharedBuffer {
  fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Poll::Ready(Ok(buf.len()))
  }

  fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
    Poll::Ready(Ok(()))
  }

  fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
    Poll::Ready(Ok(()))
  }
}

/// Checkpointer that replays scripted results and records every call.
/// Succeeds once the script runs out.
#[derive(Debug, Default)]
pub(crate) struct ScriptedCheckpointer {
  script: Mutex<VecDeque<Result<(), CheckpointError>>>,
  calls: Mutex<Vec<Option<SequencePosition>>>,
}

impl ScriptedCheckpointer {
  pub(crate) fn new(script: Vec<Result<(), CheckpointError>>) -> Self {
    Self {
      script: Mutex::new(script.into()),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub(crate) fn calls(&self) -> Vec<Option<SequencePosition>> {
    self.calls.lock().unwrap().clone()
  }

  pub(crate) fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl Checkpointer for ScriptedCheckpointer {
  async fn checkpoint(&self, position: Option<&SequencePosition>) -> Result<(), CheckpointError> {
    self.calls.lock().unwrap().push(position.cloned());
    self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
  }
}
