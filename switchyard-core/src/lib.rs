//! # Switchyard Core
//!
//! Core types shared by every Switchyard crate.
//!
//! This crate provides:
//! - [`Message`] envelope and [`EventType`] routing key
//! - [`MessageCodec`] serialization trait with a JSON implementation
//! - [`PriorityMap`] mapping event types to queue priorities
//! - Error types for encoding/decoding operations

pub mod codec;
pub mod error;
pub mod message;
pub mod priority;

pub use codec::{JsonCodec, MessageCodec};
pub use error::{Error, Result};
pub use message::{ClientId, EventType, Message};
pub use priority::PriorityMap;
