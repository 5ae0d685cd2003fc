//! Envelope codec: stamp outgoing events with the session id and check it on
//! the way in.

use crate::error::channel::ChannelError;

use common::ErrorLocation;
use models::{ChannelEvent, Envelope, SessionId};

use std::panic::Location;

/// Stamp `event` with `session_id`. Never fails.
pub fn encode(event: ChannelEvent, session_id: &SessionId) -> Envelope {
    Envelope {
        session_id: session_id.clone(),
        event,
    }
}

/// Strip the session id from `envelope` if it matches `current`.
///
/// # Errors
///
/// [`ChannelError::SessionMismatch`] when the envelope was sent under any other
/// session. Callers drop these silently.
#[track_caller]
pub fn decode(envelope: Envelope, current: &SessionId) -> Result<ChannelEvent, ChannelError> {
    if &envelope.session_id != current {
        return Err(ChannelError::SessionMismatch {
            message: format!(
                "Envelope for session {} received while current session is {}",
                envelope.session_id, current
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(envelope.event)
}
