//! Length-prefixed framing of [`Message`]s over byte streams.
//!
//! # Wire Format
//!
//! ```text
//! [length: u32 LE][payload: length bytes]
//! ```
//!
//! The payload is the binary encoding of a [`Message`]. Any failure while
//! reading a frame leaves the stream at an unknown position, so callers must
//! treat every [`CodecError`] as fatal to the connection.

use crate::network::message::Message;
use crate::types::encoding::{Decode, DecodeError, Encode};
use thiserror::Error;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the frame length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload accepted from or written to the wire (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Errors that terminate a framed stream.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("stream i/o: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),

    #[error("malformed message: {0}")]
    Malformed(#[from] DecodeError),
}

/// Encodes `message` into a complete frame, length prefix included.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, CodecError> {
    let len = message.encoded_len();
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + len);
    frame.extend_from_slice(&(len as u32).to_le_bytes());
    message.encode(&mut frame);
    Ok(frame)
}

/// Writes one frame carrying `message` and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one frame and parses its payload.
///
/// A clean end of stream before the length prefix surfaces as an
/// `UnexpectedEof` I/O error like any other short read.
pub async fn read_frame<R>(reader: &mut R) -> Result<Message, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Message::from_bytes(&payload)?)
}
