//! # Switchyard
//!
//! Transport-and-dispatch core for multi-client networked applications.
//!
//! Length-prefixed messages arrive concurrently on many client streams, are
//! ordered by priority, and are fanned out to every registered handler.
//!
//! ## Features
//!
//! - **Simple framing** - `[u32 length][payload]`, blocking and `tokio-util`
//! - **Priority ordering** - higher priority first, FIFO within a priority
//! - **Static dispatch tables** - one capability per event type per handler
//! - **Handler isolation** - errors and panics never escape the dispatch loop
//! - **Deterministic shutdown** - poller joined, sentinel queued, dispatcher joined
//!
//! ## Quick Start
//!
//! ```ignore
//! use switchyard::prelude::*;
//!
//! let streams = Arc::new(ClientStreamRegistry::new());
//! let mut handlers = HandlerRegistry::new();
//! handlers.register_table("chat", HandlerTable::new().on("Chat", |msg| {
//!     println!("{}", msg.data);
//!     Ok(())
//! }));
//!
//! let receiver = ReceiverBuilder::new()
//!     .streams(streams)
//!     .handlers(handlers)
//!     .start()?;
//!
//! receiver.stop()?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Message envelope, codec trait, priority map
//! - [`queue`] - Thread-safe priority queue
//! - [`transport`] - Framing and client streams
//! - [`server`] - Poller, dispatcher, routing tables, control surface

pub mod prelude;

/// Message envelope, codecs and priorities.
pub mod core {
    pub use switchyard_core::*;
}

/// Priority queue.
pub mod queue {
    pub use switchyard_queue::*;
}

/// Framing and client streams.
pub mod transport {
    pub use switchyard_transport::*;
}

/// Poller, dispatcher and routing tables.
pub mod server {
    pub use switchyard_server::*;
}

pub use switchyard_core::{EventType, JsonCodec, Message, MessageCodec, PriorityMap};
pub use switchyard_server::{Receiver, ReceiverBuilder};
