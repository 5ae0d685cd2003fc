//! Session-scoped messaging between a parent context and an embedded child.
//!
//! A [`ParentEndpoint`] opens a session by broadcasting a handshake with a
//! private port to the child's [`BrowsingContext`]; a [`ChildEndpoint`]
//! adopts the port and confirms. Every payload afterwards travels over that
//! port wrapped in an envelope tagged with the session id, and each side only
//! dispatches envelopes for its current session.

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod session_id;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::{ChannelConfig, RetryConfig, RetryStrategy};
pub use endpoint::{
    ChildEndpoint, ChildStatus, EndpointStatus, MessageHandler, ParentEndpoint,
    ParentEndpointBuilder, ParentStatus,
};
pub use error::{ChannelError, ConfigError};
pub use protocol::{ChildState, ParentState};
pub use session_id::{CounterSessionIds, SessionIdGenerator, UuidSessionIds};
pub use transport::{BrowsingContext, FrameSlot, HandshakeTarget, MessageChannel, MessagePort};
