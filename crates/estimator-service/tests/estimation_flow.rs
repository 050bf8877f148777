//! Socket-level tests for the estimation service.
//!
//! These tests drive a bound server through a real Unix socket client,
//! framing requests by hand so the wire protocol is exercised
//! independently of the server's own codec.

use estimator_core::Estimator;
use estimator_execution::implementations::native::NativeEngine;
use estimator_service::server::EstimatorServer;
use estimator_storage::implementations::memory::MemoryBackend;
use estimator_storage::StateBackend;
use estimator_types::StateValue;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Binds a server over a seeded in-memory backend and serves it in the
/// background, returning the shared backend for state assertions.
async fn start_server(bob_balance: i64) -> (Arc<MemoryBackend>, PathBuf, TempDir) {
	let backend = Arc::new(MemoryBackend::new());
	let driver = backend.driver();
	driver
		.set("currency.balances:bob", StateValue::Int(bob_balance))
		.await
		.unwrap();
	driver.commit().await.unwrap();

	let estimator = Estimator::new(
		Arc::clone(&backend) as Arc<dyn StateBackend>,
		Arc::new(NativeEngine::new()),
	);

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("estimator.sock");
	let server = EstimatorServer::bind(path.clone(), estimator).unwrap();
	tokio::spawn(async move {
		let _ = server.run().await;
	});

	(backend, path, dir)
}

fn transfer_request(amount: i64) -> Vec<u8> {
	json!({
		"payload": {
			"sender": "bob",
			"contract": "currency",
			"function": "transfer",
			"kwargs": { "to": "alice", "amount": amount }
		},
		"metadata": { "signature": "sig" }
	})
	.to_string()
	.into_bytes()
}

async fn send_frame(stream: &mut UnixStream, payload: &[u8]) {
	let len = u32::try_from(payload.len()).unwrap();
	stream.write_all(&len.to_be_bytes()).await.unwrap();
	stream.write_all(payload).await.unwrap();
}

async fn read_frame(stream: &mut UnixStream) -> Value {
	let mut len_buf = [0u8; 4];
	stream.read_exact(&mut len_buf).await.unwrap();
	let mut payload = vec![0u8; u32::from_be_bytes(len_buf) as usize];
	stream.read_exact(&mut payload).await.unwrap();
	serde_json::from_slice(&payload).unwrap()
}

#[tokio::test]
async fn test_transfer_estimation_end_to_end() {
	let (_backend, path, _dir) = start_server(100).await;

	let mut stream = UnixStream::connect(&path).await.unwrap();
	send_frame(&mut stream, &transfer_request(50)).await;
	let response = read_frame(&mut stream).await;

	assert_eq!(response["status"], json!(0));
	assert_eq!(response["result"], Value::Null);
	assert!(response["stamps_used"].as_u64().unwrap() > 0);

	let state = response["state"].as_array().unwrap();
	assert_eq!(state.len(), 2);
	assert_eq!(state[0]["key"], "currency.balances:alice");
	assert_eq!(state[0]["value"], json!(50));
	assert_eq!(state[1]["key"], "currency.balances:bob");
	assert_eq!(state[1]["value"], json!(50));

	// The transaction is echoed back intact
	assert_eq!(response["transaction"]["payload"]["sender"], "bob");
	assert_eq!(response["transaction"]["metadata"]["signature"], "sig");
}

#[tokio::test]
async fn test_insufficient_funds_end_to_end() {
	let (_backend, path, _dir) = start_server(10).await;

	let mut stream = UnixStream::connect(&path).await.unwrap();
	send_frame(&mut stream, &transfer_request(50)).await;
	let response = read_frame(&mut stream).await;

	assert_ne!(response["status"], json!(0));
	assert_eq!(response["state"].as_array().unwrap().len(), 0);
	let reason = response["result"].as_str().unwrap();
	assert!(reason.contains("insufficient balance"));
}

#[tokio::test]
async fn test_pipelined_requests_are_answered_in_order() {
	let (_backend, path, _dir) = start_server(100).await;

	let mut stream = UnixStream::connect(&path).await.unwrap();
	for amount in [10, 20, 30] {
		send_frame(&mut stream, &transfer_request(amount)).await;
	}

	for amount in [10, 20, 30] {
		let response = read_frame(&mut stream).await;
		assert_eq!(
			response["transaction"]["payload"]["kwargs"]["amount"],
			json!(amount)
		);
		assert_eq!(response["status"], json!(0));
	}
}

#[tokio::test]
async fn test_disconnect_mid_payload_leaves_listener_healthy() {
	let (_backend, path, _dir) = start_server(100).await;

	{
		let mut stream = UnixStream::connect(&path).await.unwrap();
		// A prefix promising 64 bytes, followed by only a fragment
		stream.write_all(&64u32.to_be_bytes()).await.unwrap();
		stream.write_all(b"frag").await.unwrap();
	}

	let mut stream = UnixStream::connect(&path).await.unwrap();
	send_frame(&mut stream, &transfer_request(50)).await;
	let response = read_frame(&mut stream).await;
	assert_eq!(response["status"], json!(0));
}

#[tokio::test]
async fn test_malformed_request_closes_connection_without_response() {
	let (_backend, path, _dir) = start_server(100).await;

	let mut stream = UnixStream::connect(&path).await.unwrap();
	send_frame(&mut stream, b"this is not json").await;

	// The server closes without sending anything back
	let mut buf = [0u8; 1];
	assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

	// And the listener still accepts new work
	let mut stream = UnixStream::connect(&path).await.unwrap();
	send_frame(&mut stream, &transfer_request(50)).await;
	assert_eq!(read_frame(&mut stream).await["status"], json!(0));
}

#[tokio::test]
async fn test_estimations_never_touch_durable_state() {
	let (backend, path, _dir) = start_server(100).await;

	let mut stream = UnixStream::connect(&path).await.unwrap();
	for _ in 0..4 {
		send_frame(&mut stream, &transfer_request(50)).await;
		let response = read_frame(&mut stream).await;
		assert_eq!(response["status"], json!(0));
	}
	drop(stream);

	let driver = backend.driver();
	assert_eq!(
		driver.get("currency.balances:bob").await.unwrap(),
		Some(StateValue::Int(100))
	);
	assert_eq!(driver.get("currency.balances:alice").await.unwrap(), None);
}
