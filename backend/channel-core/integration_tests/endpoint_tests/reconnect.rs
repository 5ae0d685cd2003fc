use crate::endpoint_tests::helpers::{
    Harness, Inbox, RawListener, WAIT, fixed_retry, port_inbox, settle, trusted_origin,
};

use channel_core::{BrowsingContext, ChildState, FrameSlot, ParentEndpoint, ParentState};
use models::{ChannelEvent, Envelope, HandshakeMessage, PortMessage};

use tokio::time::timeout;

/// **VALUE**: A reconnect supersedes the session on both ends.
///
/// **WHY THIS MATTERS**: Reconnect is how a host recovers after the child reloads.
/// The child has to drop the old port and move to the new session, or the parent's
/// new traffic would never be dispatched.
///
/// **BUG THIS CATCHES**: Would catch a child that keeps its first session forever,
/// or a parent that reuses the old session id.
#[tokio::test(start_paused = true)]
async fn given_connected_pair_when_parent_reconnects_then_both_move_to_new_session() {
    // GIVEN: A connected pair on session 1
    let mut harness = Harness::loaded();
    harness.parent.connect().unwrap();
    let first = timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap()
        .session_id()
        .cloned()
        .unwrap();

    // WHEN: Reconnecting
    harness.parent.reconnect().unwrap();
    settle().await;
    let second = timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap()
        .session_id()
        .cloned()
        .unwrap();

    // THEN: New session on both sides
    assert_ne!(first, second);
    assert_eq!(harness.child.session_id(), Some(second));
    assert_eq!(harness.child.state(), ChildState::Confirmed);

    // AND: Traffic flows on the new session
    harness
        .parent
        .post_message(ChannelEvent::primitive("after reconnect"))
        .unwrap();
    assert_eq!(
        harness.child_inbox.next().await,
        ChannelEvent::primitive("after reconnect")
    );
}

/// **VALUE**: Reconnect race. A confirmation for the superseded session must not
/// confirm the new one.
///
/// **WHY THIS MATTERS**: The child may answer session 1 just as the parent moves to
/// session 2. Treating that late echo as confirmation would mark the parent
/// `Connected` before the child has the new port.
///
/// **BUG THIS CATCHES**: Would catch a parent that confirms on any echo, or that
/// compares against the first session it ever opened.
#[tokio::test(start_paused = true)]
async fn given_reconnect_when_old_confirmation_arrives_then_parent_stays_connecting() {
    // GIVEN: A raw child that captures both handshakes
    let context = BrowsingContext::new(trusted_origin());
    let frame = FrameSlot::new();
    frame.attach(context.clone());
    let mut raw = RawListener::attach(&context);
    let parent = ParentEndpoint::builder()
        .with_target(frame)
        .with_retry_policy(fixed_retry(100, None))
        .build()
        .unwrap();

    parent.connect().unwrap();
    let first = raw.next().await;
    parent.reconnect().unwrap();
    let mut second = raw.next().await;

    let first_id = first.message().session_id().clone();
    let second_id = second.message().session_id().clone();
    assert_ne!(first_id, second_id);

    // WHEN: The echo for session 1 arrives on the current port
    let mut port = second.port.take().unwrap();
    let _replies = port_inbox(&mut port);
    let stale_echo = PortMessage::from(HandshakeMessage {
        session_id: first_id.clone(),
    });
    port.post_message(stale_echo.to_value().unwrap()).unwrap();
    settle().await;

    // THEN: Still waiting for session 2
    assert_eq!(parent.state(), ParentState::Connecting);
    assert_eq!(parent.session_id(), Some(second_id.clone()));

    // AND: The right echo confirms
    let echo = PortMessage::from(HandshakeMessage {
        session_id: second_id.clone(),
    });
    port.post_message(echo.to_value().unwrap()).unwrap();
    let status = timeout(WAIT, parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.session_id(), Some(&second_id));
}

/// **VALUE**: Stale traffic. An envelope tagged with a superseded session is
/// dropped even when it arrives on the live port.
///
/// **WHY THIS MATTERS**: Session ids are the only thing separating old traffic
/// from new. Dispatching it would hand the application data from a session it
/// already abandoned.
#[tokio::test(start_paused = true)]
async fn given_connected_on_second_session_when_first_session_envelope_arrives_then_not_dispatched()
{
    // GIVEN: A parent connected on session 2 through a raw child
    let context = BrowsingContext::new(trusted_origin());
    let frame = FrameSlot::new();
    frame.attach(context.clone());
    let mut raw = RawListener::attach(&context);
    let (handler, mut inbox) = Inbox::new();
    let parent = ParentEndpoint::builder()
        .with_target(frame)
        .with_on_message(handler)
        .build()
        .unwrap();

    parent.connect().unwrap();
    let first_id = raw.next().await.message().session_id().clone();
    parent.reconnect().unwrap();
    let mut second = raw.next().await;
    let second_id = second.message().session_id().clone();
    let port = second.port.take().unwrap();
    port.post_message(
        PortMessage::from(HandshakeMessage {
            session_id: second_id.clone(),
        })
        .to_value()
        .unwrap(),
    )
    .unwrap();
    timeout(WAIT, parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();

    // WHEN: An envelope for session 1, then one for session 2
    for (session_id, payload) in [(first_id, "stale"), (second_id, "current")] {
        let envelope = PortMessage::from(Envelope {
            session_id,
            event: ChannelEvent::primitive(payload),
        });
        port.post_message(envelope.to_value().unwrap()).unwrap();
    }

    // THEN: Only the current one is dispatched
    assert_eq!(inbox.next().await, ChannelEvent::primitive("current"));
    inbox.assert_empty().await;
}

#[tokio::test(start_paused = true)]
async fn given_reconnect_when_old_port_used_then_peer_is_gone() {
    // GIVEN: A raw child holding session 1's port
    let context = BrowsingContext::new(trusted_origin());
    let frame = FrameSlot::new();
    frame.attach(context.clone());
    let mut raw = RawListener::attach(&context);
    let parent = ParentEndpoint::builder()
        .with_target(frame)
        .build()
        .unwrap();
    parent.connect().unwrap();
    let mut first = raw.next().await;
    let old_port = first.port.take().unwrap();

    // WHEN: The parent reconnects
    parent.reconnect().unwrap();
    let _second = raw.next().await;
    settle().await;

    // THEN: The old port is disentangled
    assert!(old_port.post_message(serde_json::json!("late")).is_err());
}
