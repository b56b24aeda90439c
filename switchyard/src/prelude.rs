//! Prelude module for convenient imports.
//!
//! ```ignore
//! use switchyard::prelude::*;
//! ```

pub use std::sync::Arc;

// Core types
pub use switchyard_core::error::{Error as CoreError, Result as CoreResult};
pub use switchyard_core::{ClientId, EventType, JsonCodec, Message, MessageCodec, PriorityMap};

// Queue types
pub use switchyard_queue::{PriorityQueue, QueueError};

// Transport types
pub use switchyard_transport::{ClientStream, FrameCodec, Framer, TransportError};

// Server types
pub use switchyard_server::{
    ClientStreamRegistry, DispatchReport, EventHandler, HandlerError, HandlerRegistry,
    HandlerTable, LoopState, Receiver, ReceiverBuilder, ReceiverStats, Routes,
    SenderToClientMap, ServerError, ShutdownMode, ShutdownReport,
};
