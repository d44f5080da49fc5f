//! Line transport over the three coordinator streams.
//!
//! The coordinator writes one JSON document per line to our input and blocks
//! until it reads exactly one reply line from our output. Anything else that
//! ends up on the output descriptor (stray prints from user libraries, for
//! instance) must not be able to merge with a protocol line, so every
//! protocol line is written as `"\n" + line + "\n"` under a single lock and
//! flushed before the lock is released.

use crate::config::ProcessConfig;
use std::path::Path;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{
  AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::Mutex;

/// Boxed inbound stream.
pub type LineReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Boxed outbound stream.
pub type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Error type for transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
  /// I/O error on one of the underlying streams.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  /// A line was read that is not valid UTF-8. The offending bytes are consumed.
  #[error("line is not valid utf-8: {0}")]
  InvalidUtf8(#[from] std::string::FromUtf8Error),
  /// The transport was cleaned up; no further reads or writes are possible.
  #[error("transport is closed")]
  Closed,
}

struct Writers {
  output: Option<LineWriter>,
  diagnostics: Option<LineWriter>,
}

/// Owns the inbound command stream and the outbound protocol and diagnostic
/// streams for the lifetime of the process.
///
/// All writes, to either outbound stream, go through one lock so lines are
/// never interleaved even when both streams share a descriptor.
pub struct Transport {
  input: Mutex<Option<LineReader>>,
  writers: Mutex<Writers>,
}

impl std::fmt::Debug for Transport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Transport").finish_non_exhaustive()
  }
}

impl Transport {
  /// Creates a transport over arbitrary streams. The input is buffered here.
  pub fn new<R, W, E>(input: R, output: W, diagnostics: E) -> Self
  where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
    E: AsyncWrite + Send + Unpin + 'static,
  {
    Self::from_parts(
      Box::new(BufReader::new(input)),
      Box::new(output),
      Box::new(diagnostics),
    )
  }

  /// Creates a transport from already boxed streams.
  pub fn from_parts(input: LineReader, output: LineWriter, diagnostics: LineWriter) -> Self {
    Self {
      input: Mutex::new(Some(input)),
      writers: Mutex::new(Writers {
        output: Some(output),
        diagnostics: Some(diagnostics),
      }),
    }
  }

  /// Creates a transport over the process's stdin, stdout and stderr.
  pub fn stdio() -> Self {
    Self::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr())
  }

  /// Opens the streams named in `config`, falling back to the standard
  /// streams for any that are not set.
  pub async fn open(config: &ProcessConfig) -> Result<Self, TransportError> {
    let input: LineReader = match &config.input_file_name {
      Some(path) => Box::new(BufReader::new(File::open(path).await?)),
      None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let output: LineWriter = match &config.output_file_name {
      Some(path) => Box::new(open_for_append(path).await?),
      None => Box::new(tokio::io::stdout()),
    };
    let diagnostics: LineWriter = match &config.error_file_name {
      Some(path) => Box::new(open_for_append(path).await?),
      None => Box::new(tokio::io::stderr()),
    };
    Ok(Self::from_parts(input, output, diagnostics))
  }

  /// Reads one line, terminator included.
  ///
  /// Blocks until a full line (or end of input) is available. End of input
  /// is reported as an empty string, not as an error; the caller decides
  /// what that means.
  pub async fn read_line(&self) -> Result<String, TransportError> {
    let mut input = self.input.lock().await;
    let reader = input.as_mut().ok_or(TransportError::Closed)?;
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf).await?;
    Ok(String::from_utf8(buf)?)
  }

  /// Writes one protocol line to the output stream and flushes it.
  pub async fn write_line(&self, line: &str) -> Result<(), TransportError> {
    let mut writers = self.writers.lock().await;
    let output = writers.output.as_mut().ok_or(TransportError::Closed)?;
    output.write_all(format!("\n{}\n", line).as_bytes()).await?;
    output.flush().await?;
    Ok(())
  }

  /// Writes one line to the diagnostic stream and flushes it.
  pub async fn write_error(&self, line: &str) -> Result<(), TransportError> {
    let mut writers = self.writers.lock().await;
    let diagnostics = writers.diagnostics.as_mut().ok_or(TransportError::Closed)?;
    diagnostics.write_all(format!("{}\n", line).as_bytes()).await?;
    diagnostics.flush().await?;
    Ok(())
  }

  /// Closes all three streams.
  ///
  /// Every stream is closed even if an earlier one fails; the first failure
  /// is returned. Calling this again after it has run is a no-op.
  pub async fn cleanup(&self) -> Result<(), TransportError> {
    drop(self.input.lock().await.take());

    let (output, diagnostics) = {
      let mut writers = self.writers.lock().await;
      (writers.output.take(), writers.diagnostics.take())
    };

    let mut first_error: Option<TransportError> = None;
    for mut writer in [output, diagnostics].into_iter().flatten() {
      if let Err(e) = writer.shutdown().await {
        tracing::warn!(error = %e, "Failed to close transport stream");
        first_error.get_or_insert(TransportError::Io(e));
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  /// Returns true once [`Transport::cleanup`] has run.
  pub async fn is_closed(&self) -> bool {
    self.input.lock().await.is_none()
  }
}

async fn open_for_append(path: &Path) -> std::io::Result<File> {
  OpenOptions::new().create(true).append(true).open(path).await
}
