use crate::endpoint_tests::helpers::{Harness, WAIT, settle};

use channel_core::{ChannelError, ChildState, ParentState};
use models::{ChannelEvent, SessionState};

use serde_json::{Map, json};
use tokio::time::timeout;

/// **VALUE**: Full happy path: connect, confirm, exchange one primitive and one
/// structured payload in each direction.
///
/// **WHY THIS MATTERS**: This is the flow every host runs on startup. If any step
/// of handshake, confirmation or envelope dispatch is broken, nothing gets through.
///
/// **BUG THIS CATCHES**: Would catch:
/// - A parent that never reaches `Connected` after the child's echo
/// - Payloads altered by the envelope round trip
/// - Parent and child disagreeing on the session id
#[tokio::test(start_paused = true)]
async fn given_loaded_child_when_parent_connects_then_messages_flow_both_ways() {
    // GIVEN: A listening child on a loaded frame
    let mut harness = Harness::loaded();
    assert_eq!(harness.child.state(), ChildState::AwaitingHandshake);

    // WHEN: The parent connects
    harness.parent.connect().unwrap();
    let status = timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();

    // THEN: Both sides agree on one confirmed session
    let session = status.session.unwrap();
    assert_eq!(session.state(), SessionState::Confirmed);
    assert_eq!(harness.child.state(), ChildState::Confirmed);
    assert_eq!(harness.child.session_id().as_ref(), Some(session.id()));
    assert!(session.id().as_str().starts_with("handshake"));

    // AND: Parent -> child
    harness
        .parent
        .post_message(ChannelEvent::primitive("1700000000000"))
        .unwrap();
    assert_eq!(
        harness.child_inbox.next().await,
        ChannelEvent::primitive("1700000000000")
    );

    // AND: Child -> parent
    let mut payload = Map::new();
    payload.insert(String::from("date"), json!(1_700_000_000_000_u64));
    harness
        .child
        .post_message(ChannelEvent::data(payload.clone()))
        .unwrap();
    assert_eq!(
        harness.parent_inbox.next().await,
        ChannelEvent::data(payload)
    );
}

#[tokio::test(start_paused = true)]
async fn given_scripted_ids_when_parent_posts_then_child_gets_exactly_one_copy() {
    // GIVEN: A parent whose first session id is "h1"
    let mut harness = Harness::scripted(&["h1"]);

    // WHEN: It connects and posts one primitive
    harness.parent.connect().unwrap();
    timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
    harness
        .parent
        .post_message(ChannelEvent::primitive("42"))
        .unwrap();

    // THEN: The child holds "h1" and sees the primitive once
    assert_eq!(
        harness.child.session_id().map(|id| id.as_str().to_string()),
        Some(String::from("h1"))
    );
    assert_eq!(harness.child_inbox.next().await, ChannelEvent::primitive("42"));
    harness.child_inbox.assert_empty().await;
}

#[tokio::test(start_paused = true)]
async fn given_fresh_parent_when_inspected_then_disconnected_without_session() {
    let harness = Harness::loaded();

    assert_eq!(harness.parent.state(), ParentState::Disconnected);
    assert!(harness.parent.session_id().is_none());
    assert!(!harness.parent.is_connected());
}

#[tokio::test(start_paused = true)]
async fn given_child_without_session_when_posting_then_dropped_quietly() {
    // GIVEN: A child that never saw a handshake
    let mut harness = Harness::loaded();

    // WHEN: It posts
    harness
        .child
        .post_message(ChannelEvent::primitive("nobody"))
        .unwrap();

    // THEN: Nothing happens, child still awaiting
    harness.parent_inbox.assert_empty().await;
    assert_eq!(harness.child.state(), ChildState::AwaitingHandshake);
}

/// **VALUE**: Verifies `close` on both ends tears the channel down and rejects
/// further commands.
///
/// **WHY THIS MATTERS**: Hosts close endpoints when the frame is removed. A closed
/// endpoint that still accepted commands would look alive while doing nothing.
#[tokio::test(start_paused = true)]
async fn given_connected_endpoints_when_closed_then_idle_and_commands_rejected() {
    // GIVEN: A connected pair
    let harness = Harness::loaded();
    harness.parent.connect().unwrap();
    timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();

    // WHEN: Closing both
    harness.parent.close().unwrap();
    harness.child.close().unwrap();
    settle().await;

    // THEN: Reset to initial states, no session
    assert_eq!(harness.parent.state(), ParentState::Disconnected);
    assert!(harness.parent.session_id().is_none());
    assert_eq!(harness.child.state(), ChildState::Idle);
    assert_eq!(harness.context.listener_count(), 0);

    // AND: Further commands fail
    assert!(matches!(
        harness.parent.connect(),
        Err(ChannelError::EndpointClosed { .. })
    ));
    assert!(matches!(
        harness.child.post_message(ChannelEvent::primitive("late")),
        Err(ChannelError::EndpointClosed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn given_child_handle_dropped_when_runtime_settles_then_listener_released() {
    // GIVEN: A child listening
    let harness = Harness::loaded();
    assert_eq!(harness.context.listener_count(), 1);

    // WHEN: Dropping the handle
    let Harness { context, child, .. } = harness;
    drop(child);
    settle().await;

    // THEN: The broadcast listener is gone
    assert_eq!(context.listener_count(), 0);
}
