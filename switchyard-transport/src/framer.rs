//! Message-level framing: a [`FrameCodec`] composed with a [`MessageCodec`].

use crate::error::Result;
use crate::framing::FrameCodec;
use bytes::BytesMut;
use std::io::{Read, Write};
use switchyard_core::{JsonCodec, Message, MessageCodec};
use tokio_util::codec::Encoder;

/// Reads and writes whole messages over a byte stream.
#[derive(Debug, Clone, Default)]
pub struct Framer<C = JsonCodec> {
    frames: FrameCodec,
    codec: C,
}

impl<C: MessageCodec> Framer<C> {
    /// Creates a framer with the default frame size limit.
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self {
            frames: FrameCodec::default(),
            codec,
        }
    }

    /// Sets the maximum payload size.
    #[must_use]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.frames = FrameCodec::new(max_frame_size);
        self
    }

    /// Returns the underlying frame codec.
    #[must_use]
    pub fn frame_codec(&self) -> FrameCodec {
        self.frames
    }

    /// Reads one frame and decodes it into a message.
    ///
    /// # Errors
    /// Returns a framing error if the frame is short or oversized, or a
    /// codec error if the payload does not decode. After a codec error the
    /// stream is still positioned at the next frame.
    pub fn read_message<R: Read + ?Sized>(&self, reader: &mut R) -> Result<Message> {
        let payload = self.frames.read_frame(reader)?;
        self.decode_payload(&payload)
    }

    /// Encodes and writes one message as a frame.
    ///
    /// # Errors
    /// Returns error if encoding or the write fails.
    pub fn write_message<W: Write + ?Sized>(&self, writer: &mut W, message: &Message) -> Result<()> {
        let payload = self.codec.encode(message)?;
        self.frames.write_frame(writer, &payload)
    }

    /// Encodes a message into a complete frame, prefix included.
    ///
    /// # Errors
    /// Returns error if encoding fails or the payload is too large.
    pub fn encode(&self, message: &Message) -> Result<BytesMut> {
        let payload = self.codec.encode(message)?;
        let mut frames = self.frames;
        let mut buf = BytesMut::new();
        frames.encode(payload, &mut buf)?;
        Ok(buf)
    }

    /// Decodes a frame payload (prefix already stripped).
    ///
    /// # Errors
    /// Returns a codec error if the payload is not a valid message.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<Message> {
        Ok(self.codec.decode(payload)?)
    }
}
