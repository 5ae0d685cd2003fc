//! JSON shapes exchanged between contexts.
//!
//! Every value on the broadcast primitive or a message port is one of:
//!
//! ```text
//! { "kind": "HANDSHAKE", "sessionId": "handshake1" }
//! { "kind": "PRIMITIVE", "payload": "42",       "sessionId": "handshake1" }
//! { "kind": "DATA",      "payload": { ... },    "sessionId": "handshake1" }
//! ```

use crate::ErrorLocation;
use crate::error::model_error::ModelError;
use crate::event::ChannelEvent;
use crate::session::SessionId;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Handshake announcement (parent → child broadcast) and its confirmation
/// (child → parent, over the private port). Both use the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    pub session_id: SessionId,
}

/// An application event stamped with the session it was sent under.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub session_id: SessionId,
    pub event: ChannelEvent,
}

/// Anything that may arrive on a port or the broadcast primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireMessage", from = "WireMessage")]
pub enum PortMessage {
    Handshake(HandshakeMessage),
    Envelope(Envelope),
}

#[derive(Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
enum WireMessage {
    Handshake {
        session_id: SessionId,
    },
    Primitive {
        payload: String,
        session_id: SessionId,
    },
    Data {
        payload: Map<String, Value>,
        session_id: SessionId,
    },
}

impl From<PortMessage> for WireMessage {
    fn from(message: PortMessage) -> Self {
        match message {
            PortMessage::Handshake(HandshakeMessage { session_id }) => {
                WireMessage::Handshake { session_id }
            }
            PortMessage::Envelope(Envelope { session_id, event }) => match event {
                ChannelEvent::Primitive(payload) => WireMessage::Primitive {
                    payload,
                    session_id,
                },
                ChannelEvent::Data(payload) => WireMessage::Data {
                    payload,
                    session_id,
                },
            },
        }
    }
}

impl From<WireMessage> for PortMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::Handshake { session_id } => {
                PortMessage::Handshake(HandshakeMessage { session_id })
            }
            WireMessage::Primitive {
                payload,
                session_id,
            } => PortMessage::Envelope(Envelope {
                session_id,
                event: ChannelEvent::Primitive(payload),
            }),
            WireMessage::Data {
                payload,
                session_id,
            } => PortMessage::Envelope(Envelope {
                session_id,
                event: ChannelEvent::Data(payload),
            }),
        }
    }
}

impl PortMessage {
    /// Render into the JSON value that travels over a port.
    #[track_caller]
    pub fn to_value(&self) -> Result<Value, ModelError> {
        serde_json::to_value(self).map_err(|e| ModelError::Malformed {
            message: format!("Failed to encode port message: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Parse a received JSON value. Anything outside the three known shapes is
    /// [`ModelError::Malformed`].
    #[track_caller]
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        serde_json::from_value(value).map_err(|e| ModelError::Malformed {
            message: format!("Unrecognised port message: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Handshake(handshake) => &handshake.session_id,
            Self::Envelope(envelope) => &envelope.session_id,
        }
    }
}

impl From<HandshakeMessage> for PortMessage {
    fn from(handshake: HandshakeMessage) -> Self {
        Self::Handshake(handshake)
    }
}

impl From<Envelope> for PortMessage {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}
