use crate::endpoint_tests::helpers::{
    Harness, RawListener, WAIT, next_value, port_inbox, settle, trusted_origin, untrusted_origin,
};

use channel_core::{
    BrowsingContext, ChildState, FrameSlot, MessageChannel, ParentEndpoint, ParentState,
};
use models::{HandshakeMessage, PortMessage, SessionId};

use serde_json::json;
use tokio::time::timeout;

fn forged_handshake(id: &str) -> serde_json::Value {
    PortMessage::from(HandshakeMessage {
        session_id: SessionId::new(id).unwrap(),
    })
    .to_value()
    .unwrap()
}

/// **VALUE**: Origin check. A well-formed handshake with a port, from an untrusted
/// origin, is ignored.
///
/// **WHY THIS MATTERS**: Anything that can post to the child's context can forge a
/// handshake. If the child adopted its port, the forger would receive every message
/// the child sends.
///
/// **BUG THIS CATCHES**: Would catch a missing or inverted origin comparison, or a
/// child that adopts the port before checking the origin.
#[tokio::test(start_paused = true)]
async fn given_untrusted_handshake_with_port_when_received_then_child_ignores_it() {
    // GIVEN: A listening child
    let harness = Harness::loaded();
    let MessageChannel {
        port1: rogue_port,
        port2,
    } = MessageChannel::new();

    // WHEN: A forged handshake arrives from another origin
    harness
        .context
        .post_message(
            forged_handshake("forged1"),
            &untrusted_origin(),
            &trusted_origin(),
            vec![port2],
        )
        .unwrap();
    settle().await;

    // THEN: Child still waiting, forged port dropped
    assert_eq!(harness.child.state(), ChildState::AwaitingHandshake);
    assert!(harness.child.session_id().is_none());
    assert!(rogue_port.post_message(json!("ping")).is_err());

    // AND: A legitimate parent still connects
    harness.parent.connect().unwrap();
    timeout(WAIT, harness.child.wait_for_state(ChildState::Confirmed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(harness.child.session_id(), harness.parent.session_id());
}

#[tokio::test(start_paused = true)]
async fn given_trusted_handshake_without_port_when_received_then_child_ignores_it() {
    // GIVEN: A listening child
    let harness = Harness::loaded();

    // WHEN: A handshake with no transferred port
    harness
        .context
        .post_message(
            forged_handshake("portless1"),
            &trusted_origin(),
            &trusted_origin(),
            Vec::new(),
        )
        .unwrap();
    settle().await;

    // THEN: Nothing adopted
    assert_eq!(harness.child.state(), ChildState::AwaitingHandshake);
}

#[tokio::test(start_paused = true)]
async fn given_confirmed_child_when_untrusted_handshake_arrives_then_session_kept() {
    // GIVEN: A connected pair
    let harness = Harness::loaded();
    harness.parent.connect().unwrap();
    timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
    let session_id = harness.child.session_id();

    // WHEN: A forged handshake tries to take over
    let MessageChannel { port1: _rogue, port2 } = MessageChannel::new();
    harness
        .context
        .post_message(
            forged_handshake("takeover"),
            &untrusted_origin(),
            &trusted_origin(),
            vec![port2],
        )
        .unwrap();
    settle().await;

    // THEN: Same session, parent unaffected
    assert_eq!(harness.child.session_id(), session_id);
    assert_eq!(harness.parent.state(), ParentState::Connected);
}

/// **VALUE**: A parent never hands its handshake to a frame that is serving some
/// other origin.
///
/// **WHY THIS MATTERS**: The frame may have navigated away. Addressing the handshake
/// to the trusted origin means the other page never sees the port.
#[tokio::test(start_paused = true)]
async fn given_frame_on_other_origin_when_parent_connects_then_handshake_not_delivered() {
    // GIVEN: The frame hosts a context from another origin
    let foreign = BrowsingContext::new(untrusted_origin());
    let frame = FrameSlot::new();
    frame.attach(foreign.clone());
    let mut raw = RawListener::attach(&foreign);
    let parent = ParentEndpoint::builder()
        .with_target(frame)
        .build()
        .unwrap();

    // WHEN: Connecting
    parent.connect().unwrap();
    settle().await;

    // THEN: Nothing delivered, parent waiting for a confirmation that cannot come
    raw.assert_empty().await;
    assert_eq!(parent.state(), ParentState::Connecting);
}

/// **VALUE**: A handshake from another origin keeps its port for the context's
/// other listeners.
///
/// **WHY THIS MATTERS**: The broadcast primitive is shared with unrelated traffic.
/// A child that takes and drops every handshake-shaped port would break whoever
/// else legitimately listens for it.
///
/// **BUG THIS CATCHES**: Would catch a listener that takes the transferred port
/// before checking the sender origin.
#[tokio::test(start_paused = true)]
async fn given_untrusted_handshake_when_child_listens_then_port_left_for_others() {
    // GIVEN: A listening child and, behind it, another listener on the same context
    let harness = Harness::loaded();
    let mut other = RawListener::attach(&harness.context);
    let MessageChannel {
        port1: sender_port,
        port2,
    } = MessageChannel::new();

    // WHEN: A handshake arrives from another origin
    harness
        .context
        .post_message(
            forged_handshake("elsewhere1"),
            &untrusted_origin(),
            &trusted_origin(),
            vec![port2],
        )
        .unwrap();

    // THEN: The other listener receives the port intact
    let captured = other.next().await;
    assert_eq!(captured.origin, untrusted_origin());
    let mut port = captured.port.expect("port taken by the child");
    let mut received = port_inbox(&mut port);
    sender_port.post_message(json!("still open")).unwrap();
    assert_eq!(next_value(&mut received).await, json!("still open"));

    // AND: The child ignored the handshake
    assert_eq!(harness.child.state(), ChildState::AwaitingHandshake);
}
