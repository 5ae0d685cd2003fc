use crate::protocol::{
    ChildInput, ChildState, DropReason, Effect, ParentInput, ParentState, child_transition,
    parent_transition,
};

use models::{Session, SessionId};

fn id(value: &str) -> SessionId {
    SessionId::new(value).unwrap()
}

// ============================================
// PARENT
// ============================================

#[test]
fn given_disconnected_when_connect_with_loaded_target_then_opens_session() {
    // GIVEN: A fresh parent
    let state = ParentState::Disconnected;

    // WHEN: Connecting to a loaded target
    let transition = parent_transition(state, None, ParentInput::Connect { reachable: true });

    // THEN: Connecting, handshake goes out immediately
    assert_eq!(transition.next, ParentState::Connecting);
    assert_eq!(
        transition.effects,
        vec![Effect::CancelRetry, Effect::OpenSession]
    );
}

#[test]
fn given_disconnected_when_connect_with_unloaded_target_then_schedules_retry() {
    let transition = parent_transition(
        ParentState::Disconnected,
        None,
        ParentInput::Connect { reachable: false },
    );

    assert_eq!(transition.next, ParentState::Connecting);
    assert_eq!(
        transition.effects,
        vec![Effect::CancelRetry, Effect::ScheduleRetry]
    );
}

/// **VALUE**: Verifies a reconnect from `Connected` retires the old session before
/// opening the new one.
///
/// **WHY THIS MATTERS**: Effects run in order. If `OpenSession` ran before
/// `MarkStale`, the new session would be marked stale and the old port would stay
/// open alongside the new one.
///
/// **BUG THIS CATCHES**: Reordered effects, or a reconnect that forgets to release
/// the previous port.
#[test]
fn given_connected_when_reconnect_then_marks_stale_releases_and_opens() {
    // GIVEN: A confirmed session
    let session = Session::confirmed(id("handshake1"));

    // WHEN: Reconnecting
    let transition = parent_transition(
        ParentState::Connected,
        Some(&session),
        ParentInput::Reconnect { reachable: true },
    );

    // THEN: Old session retired, new one opened, in that order
    assert_eq!(transition.next, ParentState::Connecting);
    assert_eq!(
        transition.effects,
        vec![
            Effect::MarkStale,
            Effect::ReleaseEndpoint,
            Effect::CancelRetry,
            Effect::OpenSession,
        ]
    );
}

#[test]
fn given_connecting_with_pending_session_when_matching_confirmation_then_connected() {
    // GIVEN: A pending session
    let session = Session::pending(id("handshake1"));
    let echoed = id("handshake1");

    // WHEN: The child echoes the id
    let transition = parent_transition(
        ParentState::Connecting,
        Some(&session),
        ParentInput::Confirmation {
            session_id: &echoed,
        },
    );

    // THEN: Confirmed
    assert_eq!(transition.next, ParentState::Connected);
    assert_eq!(transition.effects, vec![Effect::Confirm]);
}

/// **VALUE**: Pure-table version of the stale-confirmation race.
///
/// **WHY THIS MATTERS**: A confirmation for session 1 arriving after the parent
/// moved to session 2 must not promote session 2. That would dispatch traffic
/// before the child has ever seen session 2's port.
#[test]
fn given_pending_second_session_when_first_session_confirmation_arrives_then_dropped() {
    // GIVEN: Session 2 pending after a reconnect
    let session = Session::pending(id("handshake2"));
    let late = id("handshake1");

    // WHEN: Session 1's confirmation shows up
    let transition = parent_transition(
        ParentState::Connecting,
        Some(&session),
        ParentInput::Confirmation { session_id: &late },
    );

    // THEN: Still connecting, input dropped
    assert_eq!(transition.next, ParentState::Connecting);
    assert_eq!(
        transition.effects,
        vec![Effect::Drop(DropReason::SessionMismatch)]
    );
}

#[test]
fn given_connected_when_duplicate_confirmation_then_dropped() {
    let session = Session::confirmed(id("handshake1"));
    let echoed = id("handshake1");

    let transition = parent_transition(
        ParentState::Connected,
        Some(&session),
        ParentInput::Confirmation {
            session_id: &echoed,
        },
    );

    assert_eq!(transition.next, ParentState::Connected);
    assert_eq!(
        transition.effects,
        vec![Effect::Drop(DropReason::SessionMismatch)]
    );
}

#[test]
fn given_connected_when_envelope_for_current_session_then_dispatched() {
    let session = Session::confirmed(id("handshake3"));
    let tagged = id("handshake3");

    let transition = parent_transition(
        ParentState::Connected,
        Some(&session),
        ParentInput::Envelope {
            session_id: &tagged,
        },
    );

    assert_eq!(transition.effects, vec![Effect::Dispatch]);
}

#[test]
fn given_connecting_when_envelope_arrives_before_confirmation_then_dropped() {
    // GIVEN: Pending session, id matches
    let session = Session::pending(id("handshake3"));
    let tagged = id("handshake3");

    // WHEN: An envelope arrives before the confirmation
    let transition = parent_transition(
        ParentState::Connecting,
        Some(&session),
        ParentInput::Envelope {
            session_id: &tagged,
        },
    );

    // THEN: Not dispatched
    assert_eq!(
        transition.effects,
        vec![Effect::Drop(DropReason::SessionMismatch)]
    );
}

#[test]
fn given_no_session_when_envelope_then_dropped_for_no_session() {
    let tagged = id("handshake9");

    let transition = parent_transition(
        ParentState::Disconnected,
        None,
        ParentInput::Envelope {
            session_id: &tagged,
        },
    );

    assert_eq!(transition.next, ParentState::Disconnected);
    assert_eq!(transition.effects, vec![Effect::Drop(DropReason::NoSession)]);
}

#[test]
fn given_waiting_for_target_when_retry_tick_then_opens_or_reschedules() {
    let loaded = parent_transition(
        ParentState::Connecting,
        None,
        ParentInput::RetryTick { reachable: true },
    );
    let unloaded = parent_transition(
        ParentState::Connecting,
        None,
        ParentInput::RetryTick { reachable: false },
    );

    assert_eq!(loaded.effects, vec![Effect::OpenSession]);
    assert_eq!(unloaded.effects, vec![Effect::ScheduleRetry]);
}

/// **VALUE**: Verifies a retry tick is inert once a session exists.
///
/// **BUG THIS CATCHES**: A tick that slipped past cancellation would otherwise open a
/// second session while the first is still pending, breaking "at most one current
/// session".
#[test]
fn given_pending_session_when_retry_tick_then_ignored() {
    let session = Session::pending(id("handshake1"));

    let transition = parent_transition(
        ParentState::Connecting,
        Some(&session),
        ParentInput::RetryTick { reachable: true },
    );

    assert_eq!(transition.next, ParentState::Connecting);
    assert!(transition.effects.is_empty());
}

#[test]
fn given_waiting_for_target_when_retry_exhausted_then_disconnected() {
    let transition = parent_transition(ParentState::Connecting, None, ParentInput::RetryExhausted);

    assert_eq!(transition.next, ParentState::Disconnected);
    assert_eq!(transition.effects, vec![Effect::GiveUp]);
}

#[test]
fn given_connected_when_close_then_cancels_and_releases() {
    let session = Session::confirmed(id("handshake1"));

    let transition = parent_transition(ParentState::Connected, Some(&session), ParentInput::Close);

    assert_eq!(transition.next, ParentState::Disconnected);
    assert_eq!(
        transition.effects,
        vec![
            Effect::CancelRetry,
            Effect::MarkStale,
            Effect::ReleaseEndpoint
        ]
    );
}

// ============================================
// CHILD
// ============================================

#[test]
fn given_idle_when_listen_then_awaiting_handshake() {
    let transition = child_transition(ChildState::Idle, None, ChildInput::Listen);

    assert_eq!(transition.next, ChildState::AwaitingHandshake);
    assert!(transition.effects.is_empty());
}

#[test]
fn given_idle_when_handshake_then_ignored() {
    let transition = child_transition(
        ChildState::Idle,
        None,
        ChildInput::Handshake {
            origin_trusted: true,
            has_endpoint: true,
        },
    );

    assert_eq!(transition.next, ChildState::Idle);
    assert!(transition.effects.is_empty());
}

#[test]
fn given_awaiting_when_trusted_handshake_with_port_then_adopts_and_replies() {
    // GIVEN: A listening child
    let state = ChildState::AwaitingHandshake;

    // WHEN: A valid handshake arrives
    let transition = child_transition(
        state,
        None,
        ChildInput::Handshake {
            origin_trusted: true,
            has_endpoint: true,
        },
    );

    // THEN: Port adopted, confirmation echoed
    assert_eq!(transition.next, ChildState::Confirmed);
    assert_eq!(
        transition.effects,
        vec![Effect::AdoptEndpoint, Effect::ReplyConfirmation]
    );
}

/// **VALUE**: Verifies the origin check runs before anything else.
///
/// **WHY THIS MATTERS**: A handshake from an untrusted origin must never make the
/// child adopt a port, no matter what else about it is valid. Checking the port
/// first would also tell an untrusted sender which part of its message was wrong.
#[test]
fn given_untrusted_origin_without_port_when_handshake_then_dropped_for_origin() {
    let transition = child_transition(
        ChildState::AwaitingHandshake,
        None,
        ChildInput::Handshake {
            origin_trusted: false,
            has_endpoint: false,
        },
    );

    assert_eq!(transition.next, ChildState::AwaitingHandshake);
    assert_eq!(
        transition.effects,
        vec![Effect::Drop(DropReason::OriginMismatch)]
    );
}

#[test]
fn given_trusted_handshake_without_port_when_handled_then_dropped_for_missing_endpoint() {
    let transition = child_transition(
        ChildState::AwaitingHandshake,
        None,
        ChildInput::Handshake {
            origin_trusted: true,
            has_endpoint: false,
        },
    );

    assert_eq!(
        transition.effects,
        vec![Effect::Drop(DropReason::MissingEndpoint)]
    );
}

#[test]
fn given_confirmed_when_newer_handshake_then_supersedes_current_session() {
    let current = id("handshake1");

    let transition = child_transition(
        ChildState::Confirmed,
        Some(&current),
        ChildInput::Handshake {
            origin_trusted: true,
            has_endpoint: true,
        },
    );

    assert_eq!(transition.next, ChildState::Confirmed);
    assert_eq!(
        transition.effects,
        vec![
            Effect::MarkStale,
            Effect::ReleaseEndpoint,
            Effect::AdoptEndpoint,
            Effect::ReplyConfirmation,
        ]
    );
}

#[test]
fn given_confirmed_when_envelope_from_previous_session_then_dropped() {
    let current = id("handshake2");
    let previous = id("handshake1");

    let transition = child_transition(
        ChildState::Confirmed,
        Some(&current),
        ChildInput::Envelope {
            session_id: &previous,
        },
    );

    assert_eq!(
        transition.effects,
        vec![Effect::Drop(DropReason::SessionMismatch)]
    );
}

#[test]
fn given_confirmed_when_close_then_idle_and_released() {
    let current = id("handshake2");

    let transition = child_transition(ChildState::Confirmed, Some(&current), ChildInput::Close);

    assert_eq!(transition.next, ChildState::Idle);
    assert_eq!(
        transition.effects,
        vec![Effect::MarkStale, Effect::ReleaseEndpoint]
    );
}
