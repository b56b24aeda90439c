//! Length-prefixed message framing.
//!
//! Frame format: `[4-byte length (little-endian u32)][payload]`
//!
//! The blocking [`FrameCodec::read_frame`] / [`FrameCodec::write_frame`] pair
//! serves the threaded receiver. The `tokio-util` [`Decoder`]/[`Encoder`]
//! implementations let async peers speak the same format.

use crate::error::{Result, TransportError};
use bytes::{Buf, BufMut, BytesMut};
use std::io::{self, Read, Write};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size (64KB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Length-prefixed frame codec.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Creates a new frame codec with the specified maximum frame size.
    ///
    /// # Arguments
    /// * `max_frame_size` - Maximum allowed payload size in bytes
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Returns the maximum frame size.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Reads exactly one frame from a blocking reader.
    ///
    /// Reads the 4-byte prefix, then loops until the announced number of
    /// payload bytes has arrived.
    ///
    /// # Errors
    /// - [`TransportError::ConnectionClosed`] if the stream ends before the prefix
    /// - [`TransportError::IncompleteHeader`] if the stream ends inside the prefix
    /// - [`TransportError::IncompleteFrame`] if the stream ends inside the payload
    /// - [`TransportError::FrameTooLarge`] if the prefix exceeds the maximum
    /// - [`TransportError::Io`] on any other read failure
    pub fn read_frame<R: Read + ?Sized>(&self, reader: &mut R) -> Result<BytesMut> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let received = read_full(reader, &mut prefix)?;
        if received == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        if received < LENGTH_PREFIX_SIZE {
            return Err(TransportError::IncompleteHeader { received });
        }

        let length = u32::from_le_bytes(prefix) as usize;
        if length > self.max_frame_size {
            tracing::warn!(length, max = self.max_frame_size, "oversized frame announced");
            return Err(TransportError::frame_too_large(length, self.max_frame_size));
        }

        let mut payload = BytesMut::zeroed(length);
        let received = read_full(reader, &mut payload)?;
        if received < length {
            return Err(TransportError::IncompleteFrame {
                expected: length,
                received,
            });
        }

        Ok(payload)
    }

    /// Writes one frame to a blocking writer and flushes it.
    ///
    /// # Errors
    /// Returns error if the payload is too large or the write fails.
    pub fn write_frame<W: Write + ?Sized>(&self, writer: &mut W, payload: &[u8]) -> Result<()> {
        let mut codec = *self;
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
        <Self as Encoder<&[u8]>>::encode(&mut codec, payload, &mut buf)?;
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

/// Reads until `buf` is full or the reader reports end of stream.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let length = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(TransportError::frame_too_large(length, self.max_frame_size));
        }

        if src.len() < LENGTH_PREFIX_SIZE + length {
            src.reserve(LENGTH_PREFIX_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(src.split_to(length)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None if src.len() < LENGTH_PREFIX_SIZE => {
                Err(TransportError::IncompleteHeader { received: src.len() })
            }
            None => {
                let expected = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
                Err(TransportError::IncompleteFrame {
                    expected,
                    received: src.len() - LENGTH_PREFIX_SIZE,
                })
            }
        }
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_frame_size {
            return Err(TransportError::frame_too_large(item.len(), self.max_frame_size));
        }

        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.put_slice(item);

        Ok(())
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&[u8]>>::encode(self, &item, dst)
    }
}
