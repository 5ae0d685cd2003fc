//! Wire and domain models for portbridge.
//!
//! This crate contains the plain data that crosses the boundary between a
//! host context and its embedded child: session ids, origins, application
//! events and the JSON shapes they travel in. There is no protocol logic
//! here; the handshake state machines live in `channel-core`.
//!
//! ## Architecture
//!
//! - **models** (this crate): Data and wire shapes
//! - **channel-core**: Handshake protocol, transports, endpoints
//! - **portbridge**: Demo wiring a host and a child together

pub mod error;
pub mod event;
pub mod origin;
pub mod session;
pub mod wire;

pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use event::{ChannelEvent, ChannelEventKind};
pub use origin::Origin;
pub use session::{Session, SessionId, SessionState};
pub use wire::{Envelope, HandshakeMessage, PortMessage};

#[cfg(test)]
mod tests;
