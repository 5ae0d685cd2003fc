//! In-process transport primitives the handshake is built on.
//!
//! - [`MessageChannel`] / [`MessagePort`]: a dedicated two-port transport, FIFO
//!   per direction, with buffering until a handler is attached
//! - [`BrowsingContext`]: an origin-scoped broadcast target; every registered
//!   listener sees every message addressed to it
//! - [`HandshakeTarget`] / [`FrameSlot`]: a child context that may not be
//!   loaded yet
//!
//! Everything here spawns Tokio tasks and must be used from within a runtime.

mod browsing_context;
mod message_channel;
mod target;

pub use browsing_context::{BroadcastEvent, BrowsingContext, ListenerGuard};
pub use message_channel::{MessageChannel, MessagePort, PortId};
pub use target::{FrameSlot, HandshakeTarget};
