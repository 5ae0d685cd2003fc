use crate::ErrorLocation;
use crate::error::model_error::ModelError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token identifying one handshake attempt.
///
/// Ids are compared for equality only; nothing is derived from their content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a non-empty token.
    #[track_caller]
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Session id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Self(value))
    }

    /// `<prefix><ordinal>`, e.g. `handshake3`. Never empty.
    pub fn from_ordinal(prefix: &str, ordinal: u64) -> Self {
        Self(format!("{prefix}{ordinal}"))
    }

    /// Hyphenated UUID form. Never empty.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = ModelError;

    #[track_caller]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ModelError;

    #[track_caller]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Lifecycle of a single session as seen by one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Handshake sent (parent) or received (child), confirmation outstanding.
    Pending,
    /// Confirmation observed; traffic tagged with this id is accepted.
    Confirmed,
    /// Superseded by a newer session. Traffic tagged with this id is dropped.
    Stale,
}

impl Display for SessionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::Pending => write!(formatter, "pending"),
            Self::Confirmed => write!(formatter, "confirmed"),
            Self::Stale => write!(formatter, "stale"),
        }
    }
}

/// One handshake-to-supersession lifetime.
///
/// The transport endpoint owned for the session is held next to this record by
/// the endpoint that created it; the record itself is plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    pub fn pending(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Pending,
        }
    }

    /// A child adopts a session as confirmed the moment it replies.
    pub fn confirmed(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Confirmed,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == SessionState::Confirmed
    }

    /// Move `Pending -> Confirmed`. Returns false for any other starting state.
    pub fn confirm(&mut self) -> bool {
        if self.state == SessionState::Pending {
            self.state = SessionState::Confirmed;
            true
        } else {
            false
        }
    }

    /// Stale is terminal.
    pub fn mark_stale(&mut self) {
        self.state = SessionState::Stale;
    }

    /// True when traffic tagged `id` belongs to this session and it is live.
    pub fn accepts(&self, id: &SessionId) -> bool {
        self.state == SessionState::Confirmed && &self.id == id
    }
}
