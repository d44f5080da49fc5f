//! Example record processor: logs every record it receives.
//!
//! Usage: `kcl-multilang [config.json]`. Point the MultiLangDaemon's
//! `executableName` at this binary.

use kcl_multilang::config::ProcessConfig;
use kcl_multilang::dispatch::Dispatcher;
use kcl_multilang::logging;
use kcl_multilang::processor::{DefaultRecordProcessor, LoggingRecordHandler};
use kcl_multilang::transport::Transport;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let config = match std::env::args().nth(1) {
    Some(path) => ProcessConfig::load(path)?,
    None => ProcessConfig::default(),
  };
  logging::init(&config)?;

  tracing::info!(
    stream_name = config.stream_name.as_deref().unwrap_or("<unset>"),
    "Starting record processor"
  );

  let transport = Arc::new(Transport::open(&config).await?);
  let processor = DefaultRecordProcessor::new(config.checkpoint_policy(), LoggingRecordHandler::new());
  let mut dispatcher = Dispatcher::new(transport, processor);

  if let Err(e) = dispatcher.run().await {
    tracing::error!(error = %e, "Record processor stopped");
    return Err(e.into());
  }
  Ok(())
}
