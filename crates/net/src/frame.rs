//! Framing for the TCP transport
//!
//! A frame is a big-endian `u32` byte count followed by that many bytes of
//! JSON. Zero-length frames and frames above the configured limit are
//! protocol errors on both the reading and the writing side.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::Message;

/// Default frame limit (64KB). Game messages are a few hundred bytes.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024;

const LEN_PREFIX: usize = 4;

/// Validate a payload length against `max_size`
fn check_len(len: usize, max_size: u32) -> Result<u32> {
    match u32::try_from(len) {
        Ok(0) => Err(Error::Protocol("Empty frame".into())),
        Ok(n) if n <= max_size => Ok(n),
        _ => Err(Error::Protocol(format!(
            "Frame of {} bytes exceeds limit of {}",
            len, max_size
        ))),
    }
}

/// EOF mid-frame means the peer went away
fn closed_on_eof(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
        _ => Error::Io(e),
    }
}

/// Read and decode the next frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_size: u32) -> Result<Message> {
    let len = reader.read_u32().await.map_err(closed_on_eof)?;
    let len = check_len(len as usize, max_size)?;

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(closed_on_eof)?;

    Message::from_bytes(&payload)
        .map_err(|e| Error::Protocol(format!("Undecodable message: {}", e)))
}

/// Encode `msg` and write it as a single frame
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Message,
    max_size: u32,
) -> Result<()> {
    let payload = msg
        .to_bytes()
        .map_err(|e| Error::Protocol(format!("Unencodable message: {}", e)))?;
    let len = check_len(payload.len(), max_size)?;

    let mut buf = Vec::with_capacity(LEN_PREFIX + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
