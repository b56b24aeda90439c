//! # Switchyard Transport
//!
//! Wire framing and stream abstractions.
//!
//! This crate provides:
//! - [`framing`] - `[u32 length][payload]` frame codec, sync and `tokio-util`
//! - [`framer`] - frame codec composed with a [`switchyard_core::MessageCodec`]
//! - [`stream`] - the [`ClientStream`] trait polled by the receiver

pub mod error;
pub mod framer;
pub mod framing;
pub mod stream;

pub use error::{Result, TransportError};
pub use framer::Framer;
pub use framing::FrameCodec;
pub use stream::ClientStream;
