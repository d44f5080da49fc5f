//! # kcl-multilang
//!
//! Record processors for the Kinesis Client Library MultiLangDaemon, in Rust.
//!
//! The daemon owns shard leases and record delivery. It starts this process
//! and talks to it over stdin/stdout with one JSON document per line. This
//! crate speaks that protocol: it decodes actions, drives a
//! [`RecordProcessor`](processor::RecordProcessor) through
//! `initialize → process_records* → shutdown`, acknowledges each action, and
//! runs the nested checkpoint exchange with the daemon's retry rules.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kcl_multilang::config::ProcessConfig;
//! use kcl_multilang::dispatch::Dispatcher;
//! use kcl_multilang::error::BoxError;
//! use kcl_multilang::message::Record;
//! use kcl_multilang::processor::DefaultRecordProcessor;
//! use kcl_multilang::transport::Transport;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProcessConfig::default();
//! let handler = |record: &Record| -> Result<(), BoxError> {
//!   let _payload = record.binary_data()?;
//!   Ok(())
//! };
//! let processor = DefaultRecordProcessor::new(config.checkpoint_policy(), handler);
//! let mut dispatcher = Dispatcher::new(Arc::new(Transport::stdio()), processor);
//! dispatcher.run().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Checkpoint request/response exchange and its error taxonomy.
pub mod checkpoint;
/// Line codec for protocol messages.
pub mod codec;
/// Process configuration.
pub mod config;
/// The action dispatch loop.
pub mod dispatch;
/// Processor-level errors.
pub mod error;
/// Tracing subscriber setup.
pub mod logging;
/// Protocol message types.
pub mod message;
/// Checkpoint cadence and retry policy.
pub mod policy;
/// Record processing lifecycle and the default processor.
pub mod processor;
/// Sequence positions and the high-water-mark tracker.
pub mod sequence;
/// Line transport over the coordinator streams.
pub mod transport;

#[cfg(test)]
mod testing;
