//! Length-prefixed message framing.
//!
//! Each message on the wire is a 4-byte big-endian unsigned length
//! followed by that many bytes of UTF-8 JSON. The codec is
//! transport-only: it never inspects the body.
//!
//! A short read anywhere, inside the prefix or inside the body, is
//! treated as peer disconnection, not corruption. A zero-length frame is
//! treated the same way: an empty body is never a valid message, only a
//! peer going away.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one message, returning `None` when the peer disconnected.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
	R: AsyncRead + Unpin,
{
	let mut len_buf = [0u8; 4];
	match reader.read_exact(&mut len_buf).await {
		Ok(_) => {},
		Err(e) if is_disconnect(&e) => return Ok(None),
		Err(e) => return Err(e),
	}

	let len = u32::from_be_bytes(len_buf) as usize;
	if len == 0 {
		return Ok(None);
	}

	let mut payload = vec![0u8; len];
	match reader.read_exact(&mut payload).await {
		Ok(_) => Ok(Some(payload)),
		Err(e) if is_disconnect(&e) => Ok(None),
		Err(e) => Err(e),
	}
}

/// Writes one message, prefix and body, transmitting the full buffer.
pub async fn write_message<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
	W: AsyncWrite + Unpin,
{
	let len = u32::try_from(payload.len()).map_err(|_| {
		io::Error::new(
			io::ErrorKind::InvalidInput,
			"payload exceeds the framing length limit",
		)
	})?;
	writer.write_all(&len.to_be_bytes()).await?;
	writer.write_all(payload).await?;
	writer.flush().await
}

/// Whether an I/O error means the peer went away mid-message.
fn is_disconnect(error: &io::Error) -> bool {
	matches!(
		error.kind(),
		io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
	)
}
