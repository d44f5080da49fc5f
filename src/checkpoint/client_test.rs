//! Tests for the checkpoint client over a real transport.

use crate::checkpoint::{CheckpointClient, CheckpointError, CheckpointErrorKind, Checkpointer};
use crate::sequence::SequencePosition;
use crate::testing::SharedBuffer;
use crate::transport::Transport;
use std::io::Cursor;
use std::sync::Arc;

fn client(responses: &str) -> (CheckpointClient, Arc<Transport>, SharedBuffer) {
  let output = SharedBuffer::default();
  let transport = Arc::new(Transport::new(
    Cursor::new(responses.as_bytes().to_vec()),
    output.clone(),
    tokio::io::sink(),
  ));
  (CheckpointClient::new(Arc::clone(&transport)), transport, output)
}

#[tokio::test]
async fn test_checkpoint_at_position_sends_request_and_succeeds() {
  let (client, _, output) = client(
    "{\"action\":\"checkpoint\",\"sequenceNumber\":\"98765432109876543210987\",\"subSequenceNumber\":4}\n",
  );
  let position = SequencePosition::parse("98765432109876543210987", 4).unwrap();

  client.checkpoint(Some(&position)).await.unwrap();

  assert_eq!(
    output.contents(),
    "\n{\"action\":\"checkpoint\",\"sequenceNumber\":\"98765432109876543210987\",\"subSequenceNumber\":4}\n"
  );
}

#[tokio::test]
async fn test_checkpoint_latest_sends_null_sequence_number() {
  let (client, _, output) = client("{\"action\":\"checkpoint\"}\n");

  client.checkpoint(None).await.unwrap();

  assert_eq!(
    output.contents(),
    "\n{\"action\":\"checkpoint\",\"sequenceNumber\":null,\"subSequenceNumber\":0}\n"
  );
}

#[tokio::test]
async fn test_coordinator_error_is_surfaced_literally() {
  let (client, _, _) = client(
    "{\"action\":\"checkpoint\",\"error\":\"ThrottlingException\"}\n\
     {\"action\":\"checkpoint\",\"error\":\"ShutdownException\"}\n\
     {\"action\":\"checkpoint\",\"error\":\"KinesisClientLibDependencyException\"}\n",
  );

  let first = client.checkpoint(None).await.unwrap_err();
  assert_eq!(first.kind(), Some(&CheckpointErrorKind::Throttling));
  assert_eq!(first.to_string(), "checkpoint rejected: ThrottlingException");

  let second = client.checkpoint(None).await.unwrap_err();
  assert_eq!(second.kind(), Some(&CheckpointErrorKind::Shutdown));

  let third = client.checkpoint(None).await.unwrap_err();
  assert_eq!(
    third.kind(),
    Some(&CheckpointErrorKind::Other("KinesisClientLibDependencyException".to_string()))
  );
}

#[tokio::test]
async fn test_non_checkpoint_response_is_invalid_state() {
  let (client, _, _) = client("{\"action\":\"shutdown\",\"reason\":\"TERMINATE\"}\n");

  let err = client.checkpoint(None).await.unwrap_err();

  assert_eq!(err.kind(), Some(&CheckpointErrorKind::InvalidState));
  assert!(err.is_fatal());
}

#[tokio::test]
async fn test_undecodable_response_is_a_codec_error() {
  let (client, _, _) = client("[2024-01-01] some log noise\n");

  let err = client.checkpoint(None).await.unwrap_err();

  assert!(matches!(err, CheckpointError::Codec(_)));
  assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_closed_transport_is_a_transport_error() {
  let (client, transport, _) = client("");
  transport.cleanup().await.unwrap();

  let err = client.checkpoint(None).await.unwrap_err();

  assert!(matches!(err, CheckpointError::Transport(_)));
}

#[tokio::test]
async fn test_request_is_written_before_response_is_read() {
  let mock = tokio_test::io::Builder::new()
    .write(b"\n{\"action\":\"checkpoint\",\"sequenceNumber\":\"7\",\"subSequenceNumber\":0}\n")
    .read(b"{\"action\":\"checkpoint\",\"sequenceNumber\":\"7\",\"subSequenceNumber\":0}\n")
    .build();
  let (reader, writer) = tokio::io::split(mock);
  let transport = Arc::new(Transport::new(reader, writer, tokio::io::sink()));
  let client = CheckpointClient::new(transport);

  let position = SequencePosition::parse("7", 0).unwrap();
  client.checkpoint(Some(&position)).await.unwrap();
}
