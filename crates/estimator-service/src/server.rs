//! Unix socket server for the estimation service.
//!
//! The server owns the listening socket for the process lifetime:
//! `bind` removes any stale socket file and starts listening, `close`
//! releases the socket and unlinks the path. Connections are served
//! strictly one at a time; a second client queues at the transport
//! layer until the first disconnects. There is no per-request timeout,
//! so a slow contract call stalls later callers.
//!
//! Per connection, the request loop is: read one frame, parse the
//! transaction, run the estimation pipeline, write one response frame,
//! repeat until the peer disconnects. Transport failures and engine
//! faults are connection-scoped: the connection closes (without a
//! response, when one was not yet sent) and the listener stays alive.

use crate::framing;
use estimator_core::{format, Estimator};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};

/// Errors that can occur in the socket server.
#[derive(Debug, Error)]
pub enum ServerError {
	/// Error from the underlying socket.
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
}

/// The estimation socket server.
pub struct EstimatorServer {
	/// The listening socket, owned for the process lifetime.
	listener: UnixListener,
	/// Filesystem path the socket is bound at.
	path: PathBuf,
	/// The estimation pipeline requests are driven through.
	estimator: Estimator,
}

impl EstimatorServer {
	/// Binds the server, removing any stale socket file left from a
	/// prior run.
	pub fn bind(path: impl Into<PathBuf>, estimator: Estimator) -> Result<Self, ServerError> {
		let path = path.into();
		remove_stale_socket(&path)?;
		let listener = UnixListener::bind(&path)?;
		tracing::info!(path = %path.display(), "Listening");
		Ok(Self {
			listener,
			path,
			estimator,
		})
	}

	/// Returns the path the server is bound at.
	pub fn local_path(&self) -> &Path {
		&self.path
	}

	/// Accepts and serves connections until the listener fails.
	///
	/// One connection is served fully before the next accept;
	/// connection-scoped failures are logged and never stop the loop.
	pub async fn run(&self) -> Result<(), ServerError> {
		loop {
			let (stream, _addr) = self.listener.accept().await?;
			tracing::info!("Client connected");
			if let Err(e) = self.serve_connection(stream).await {
				tracing::warn!("Connection ended with transport error: {}", e);
			}
			tracing::info!("Client disconnected");
		}
	}

	/// Drives the request loop for one connection.
	async fn serve_connection(&self, mut stream: UnixStream) -> Result<(), ServerError> {
		loop {
			let Some(raw) = framing::read_message(&mut stream).await? else {
				return Ok(());
			};

			let transaction = match serde_json::from_slice(&raw) {
				Ok(transaction) => transaction,
				Err(e) => {
					tracing::warn!("Malformed request, closing connection: {}", e);
					return Ok(());
				},
			};

			let output = match self.estimator.estimate(transaction).await {
				Ok(output) => output,
				Err(e) => {
					tracing::error!(
						"Estimation fault, closing connection without a response: {}",
						e
					);
					return Ok(());
				},
			};

			let encoded = match format::encode_response(&output) {
				Ok(encoded) => encoded,
				Err(e) => {
					tracing::error!("Unserializable response, closing connection: {}", e);
					return Ok(());
				},
			};

			if let Err(e) = framing::write_message(&mut stream, &encoded).await {
				if e.kind() == io::ErrorKind::BrokenPipe {
					tracing::warn!("Cannot send response, peer closed its read side");
					return Ok(());
				}
				return Err(e.into());
			}
		}
	}

	/// Releases the listening socket and unlinks its path.
	pub fn close(self) -> io::Result<()> {
		drop(self.listener);
		match std::fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e),
		}
	}
}

/// Unlinks a leftover socket file so a restart can rebind.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
	match std::fs::remove_file(path) {
		Ok(()) => {
			tracing::debug!(path = %path.display(), "Removed stale socket file");
			Ok(())
		},
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e),
	}
}
