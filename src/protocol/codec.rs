//! # Length-prefixed framing.
//!
//! ```text
//! ┌───────────────┬───────────────────────────────┐
//! │ u32 LE length │ envelope bytes (length bytes) │
//! └───────────────┴───────────────────────────────┘
//! ```
//!
//! Two ways to use it:
//! - [`read_frame`] / [`write_frame`] for plain `AsyncRead`/`AsyncWrite` halves (worker side);
//! - [`FrameCodec`] with `tokio_util::codec::{FramedRead, FramedWrite}` (engine side).
//!   `FramedRead::next()` keeps partial frames in its buffer, so it is safe to race
//!   inside `tokio::select!`.
//!
//! ## Rules
//! - End of stream before a whole frame is an **I/O error** (`UnexpectedEof`, or
//!   "bytes remaining on stream" from `FramedRead`), not a decode error.
//! - Length prefixes above the configured maximum are rejected before any allocation.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::CodecError;
use crate::protocol::envelope::{self, Envelope};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX: usize = 4;

/// Default upper bound on a single frame body (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

fn length_of(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })
}

/// Prepends the 4-byte little-endian length prefix to `bytes`.
pub fn frame(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = length_of(bytes.len())?;
    let mut out = Vec::with_capacity(LENGTH_PREFIX + bytes.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Reads one frame and returns its body (the envelope bytes).
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = reader.read_u32_le().await? as usize;
    if len > max_len {
        return Err(CodecError::FrameTooLarge { len, max: max_len });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Encodes, frames, writes, and flushes one envelope.
pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = frame(&envelope::encode(envelope)?)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// `tokio_util` codec for framed [`Envelope`]s.
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    max_len: usize,
}

impl FrameCodec {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Envelope;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX]);
        let len = u32::from_le_bytes(prefix) as usize;
        if len > self.max_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_len,
            });
        }

        let total = LENGTH_PREFIX + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let body = src.split_to(len);
        envelope::decode(&body).map(Some)
    }
}

impl Encoder<Envelope> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), CodecError> {
        let body = envelope::encode(&item)?;
        if body.len() > self.max_len {
            return Err(CodecError::FrameTooLarge {
                len: body.len(),
                max: self.max_len,
            });
        }
        let len = length_of(body.len())?;
        dst.reserve(LENGTH_PREFIX + body.len());
        dst.put_u32_le(len);
        dst.extend_from_slice(&body);
        Ok(())
    }
}
