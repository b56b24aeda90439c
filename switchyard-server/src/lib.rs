//! # Switchyard Server
//!
//! Transport-and-dispatch core for multi-client applications.
//!
//! This crate provides:
//! - Routing tables for client streams and sender identities
//! - Per-handler capability tables keyed by event type
//! - A stream poller feeding a priority queue
//! - A dispatch loop fanning messages out to every handler
//! - A builder and control handle with synchronous, two-stage shutdown

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod receiver;
pub mod registry;
pub mod state;

pub use builder::{Receiver, ReceiverBuilder, ShutdownMode, ShutdownReport};
pub use dispatcher::{DispatchReport, HandlerRegistry};
pub use error::{HandlerError, ServerError};
pub use handler::{Capability, CapabilityRef, EventHandler, HandlerTable, RegistrationCapability};
pub use registry::{ClientStreamRegistry, Routes, SenderToClientMap};
pub use state::{LoopState, ReceiverStats};
