use crate::error::channel::ChannelError;

use common::ErrorLocation;
use models::{Session, SessionId};

use std::panic::Location;

use tokio::sync::watch;

/// Snapshot published by an endpoint task after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus<S> {
    pub state: S,
    /// The current session. Stale sessions are never reported.
    pub session: Option<Session>,
}

impl<S> EndpointStatus<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            state,
            session: None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(Session::id)
    }
}

/// Wait until the published state equals `state`.
///
/// Fails with [`ChannelError::EndpointClosed`] if the endpoint task stops
/// before that happens.
pub(crate) async fn wait_for_state<S>(
    mut status: watch::Receiver<EndpointStatus<S>>,
    state: S,
) -> Result<EndpointStatus<S>, ChannelError>
where
    S: PartialEq + Clone,
{
    let reached = status
        .wait_for(|current| current.state == state)
        .await
        .map_err(|_| ChannelError::EndpointClosed {
            message: String::from("Endpoint stopped before reaching the requested state"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(reached.clone())
}
