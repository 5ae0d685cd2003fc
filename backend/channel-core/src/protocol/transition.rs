use models::{Session, SessionId, SessionState};

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Parent endpoint lifecycle.
///
/// `Connecting` covers both "waiting for the target to load" (no session yet,
/// retry scheduled) and "handshake sent, waiting for confirmation".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentState {
    Disconnected,
    Connecting,
    Connected,
}

/// Child endpoint lifecycle. There is no way back to `AwaitingHandshake`: a
/// new handshake moves `Confirmed -> Confirmed` with a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Idle,
    AwaitingHandshake,
    Confirmed,
}

impl Display for ParentState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::Disconnected => write!(formatter, "disconnected"),
            Self::Connecting => write!(formatter, "connecting"),
            Self::Connected => write!(formatter, "connected"),
        }
    }
}

impl Display for ChildState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::Idle => write!(formatter, "idle"),
            Self::AwaitingHandshake => write!(formatter, "awaiting handshake"),
            Self::Confirmed => write!(formatter, "confirmed"),
        }
    }
}

/// Why an inbound message was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Tagged with an id other than the current live session.
    SessionMismatch,
    /// Nothing to match against: no session exists.
    NoSession,
    /// Handshake from an untrusted origin.
    OriginMismatch,
    /// Handshake without a transferred port.
    MissingEndpoint,
}

/// Side effects an endpoint performs after a transition, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Mark the current session stale and forget it.
    MarkStale,
    /// Close the owned port and its handler.
    ReleaseEndpoint,
    /// Abort any scheduled retry and invalidate ticks already in flight.
    CancelRetry,
    /// Generate an id, create a channel, broadcast the handshake.
    OpenSession,
    /// Ask the retry policy for the next delay and arm a timer.
    ScheduleRetry,
    /// The retry policy is exhausted.
    GiveUp,
    /// The pending session is now confirmed.
    Confirm,
    /// Take ownership of the transferred port and record its session.
    AdoptEndpoint,
    /// Echo the handshake back over the adopted port.
    ReplyConfirmation,
    /// Hand the decoded event to the application.
    Dispatch,
    /// Discard the input.
    Drop(DropReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<S> {
    pub next: S,
    pub effects: Vec<Effect>,
}

impl<S> Transition<S> {
    fn to(next: S, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn stay(state: S) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn dropped(state: S, reason: DropReason) -> Self {
        Self {
            next: state,
            effects: vec![Effect::Drop(reason)],
        }
    }
}

/// Inputs a parent endpoint reacts to. `reachable` is whether the target had a
/// loaded context when the input was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentInput<'a> {
    Connect { reachable: bool },
    Reconnect { reachable: bool },
    RetryTick { reachable: bool },
    RetryExhausted,
    Confirmation { session_id: &'a SessionId },
    Envelope { session_id: &'a SessionId },
    Close,
}

/// Parent transition table.
///
/// `session` is the current (pending or confirmed) session, if any. Stale
/// sessions are never passed in; the parent forgets them on `MarkStale`.
pub fn parent_transition(
    state: ParentState,
    session: Option<&Session>,
    input: ParentInput<'_>,
) -> Transition<ParentState> {
    match input {
        ParentInput::Connect { reachable } | ParentInput::Reconnect { reachable } => {
            let mut effects = Vec::with_capacity(4);
            if session.is_some() {
                effects.push(Effect::MarkStale);
                effects.push(Effect::ReleaseEndpoint);
            }
            effects.push(Effect::CancelRetry);
            effects.push(if reachable {
                Effect::OpenSession
            } else {
                Effect::ScheduleRetry
            });
            Transition::to(ParentState::Connecting, effects)
        }

        // Ticks only matter while still waiting for the target to load.
        ParentInput::RetryTick { reachable } => match (state, session) {
            (ParentState::Connecting, None) if reachable => {
                Transition::to(ParentState::Connecting, vec![Effect::OpenSession])
            }
            (ParentState::Connecting, None) => {
                Transition::to(ParentState::Connecting, vec![Effect::ScheduleRetry])
            }
            _ => Transition::stay(state),
        },

        ParentInput::RetryExhausted => match (state, session) {
            (ParentState::Connecting, None) => {
                Transition::to(ParentState::Disconnected, vec![Effect::GiveUp])
            }
            _ => Transition::stay(state),
        },

        ParentInput::Confirmation { session_id } => match session {
            Some(current)
                if state == ParentState::Connecting
                    && current.state() == SessionState::Pending
                    && current.id() == session_id =>
            {
                Transition::to(ParentState::Connected, vec![Effect::Confirm])
            }
            Some(_) => Transition::dropped(state, DropReason::SessionMismatch),
            None => Transition::dropped(state, DropReason::NoSession),
        },

        ParentInput::Envelope { session_id } => match session {
            Some(current) if state == ParentState::Connected && current.accepts(session_id) => {
                Transition::to(state, vec![Effect::Dispatch])
            }
            Some(_) => Transition::dropped(state, DropReason::SessionMismatch),
            None => Transition::dropped(state, DropReason::NoSession),
        },

        ParentInput::Close => {
            let mut effects = vec![Effect::CancelRetry];
            if session.is_some() {
                effects.push(Effect::MarkStale);
                effects.push(Effect::ReleaseEndpoint);
            }
            Transition::to(ParentState::Disconnected, effects)
        }
    }
}

/// Inputs a child endpoint reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildInput<'a> {
    /// The broadcast listener has been registered.
    Listen,
    Handshake {
        origin_trusted: bool,
        has_endpoint: bool,
    },
    Envelope {
        session_id: &'a SessionId,
    },
    Close,
}

/// Child transition table. `current` is the id of the adopted session, if any.
pub fn child_transition(
    state: ChildState,
    current: Option<&SessionId>,
    input: ChildInput<'_>,
) -> Transition<ChildState> {
    match input {
        ChildInput::Listen => match state {
            ChildState::Idle => Transition::to(ChildState::AwaitingHandshake, Vec::new()),
            _ => Transition::stay(state),
        },

        ChildInput::Handshake {
            origin_trusted,
            has_endpoint,
        } => {
            if state == ChildState::Idle {
                return Transition::stay(state);
            }
            // Origin first: an untrusted sender learns nothing about whether
            // its message was otherwise well formed.
            if !origin_trusted {
                return Transition::dropped(state, DropReason::OriginMismatch);
            }
            if !has_endpoint {
                return Transition::dropped(state, DropReason::MissingEndpoint);
            }

            let mut effects = Vec::with_capacity(4);
            if current.is_some() {
                effects.push(Effect::MarkStale);
                effects.push(Effect::ReleaseEndpoint);
            }
            effects.push(Effect::AdoptEndpoint);
            effects.push(Effect::ReplyConfirmation);
            Transition::to(ChildState::Confirmed, effects)
        }

        ChildInput::Envelope { session_id } => match current {
            Some(current) if state == ChildState::Confirmed && current == session_id => {
                Transition::to(state, vec![Effect::Dispatch])
            }
            Some(_) => Transition::dropped(state, DropReason::SessionMismatch),
            None => Transition::dropped(state, DropReason::NoSession),
        },

        ChildInput::Close => {
            let effects = if current.is_some() {
                vec![Effect::MarkStale, Effect::ReleaseEndpoint]
            } else {
                Vec::new()
            };
            Transition::to(ChildState::Idle, effects)
        }
    }
}
