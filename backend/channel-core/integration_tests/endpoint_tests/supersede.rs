use crate::endpoint_tests::helpers::{Inbox, next_value, port_inbox, settle, trusted_origin};

use channel_core::{
    BrowsingContext, ChannelError, ChildEndpoint, ChildState, MessageChannel, codec,
};
use models::{ChannelEvent, HandshakeMessage, PortMessage, SessionId};

use serde_json::Value;

fn handshake(id: &str) -> Value {
    PortMessage::from(HandshakeMessage {
        session_id: SessionId::new(id).unwrap(),
    })
    .to_value()
    .unwrap()
}

fn envelope(event: ChannelEvent, id: &str) -> Value {
    PortMessage::from(codec::encode(event, &SessionId::new(id).unwrap()))
        .to_value()
        .unwrap()
}

/// **VALUE**: Two handshakes back to back leave the child on the newer session,
/// with the older port closed and the older session's envelopes ignored.
///
/// **WHY THIS MATTERS**: A parent that reconnects quickly sends a second handshake
/// before it has seen the first confirmation. The child must follow the latest one
/// and must not keep listening on, or dispatching from, the abandoned session.
///
/// **BUG THIS CATCHES**: Would catch:
/// - A child that keeps the first port open after adopting the second
/// - A child that still dispatches envelopes tagged with the superseded id
/// - A child that confirms the second handshake but records the first id
#[tokio::test(start_paused = true)]
async fn given_two_handshakes_when_second_adopted_then_first_session_abandoned() {
    // GIVEN: A listening child
    let context = BrowsingContext::new(trusted_origin());
    let (handler, mut inbox) = Inbox::new();
    let child = ChildEndpoint::new(&context, trusted_origin(), handler);

    let MessageChannel {
        port1: mut first,
        port2: first_remote,
    } = MessageChannel::new();
    let MessageChannel {
        port1: mut second,
        port2: second_remote,
    } = MessageChannel::new();
    let mut first_replies = port_inbox(&mut first);
    let mut second_replies = port_inbox(&mut second);

    // WHEN: Handshakes "h1" then "h2" arrive before either confirmation is read
    context
        .post_message(handshake("h1"), &trusted_origin(), &trusted_origin(), vec![first_remote])
        .unwrap();
    context
        .post_message(handshake("h2"), &trusted_origin(), &trusted_origin(), vec![second_remote])
        .unwrap();

    // THEN: Each handshake was echoed on its own port
    assert_eq!(next_value(&mut first_replies).await, handshake("h1"));
    assert_eq!(next_value(&mut second_replies).await, handshake("h2"));
    settle().await;

    // AND: The child sits on "h2"
    assert_eq!(child.state(), ChildState::Confirmed);
    assert_eq!(child.session_id(), Some(SessionId::new("h2").unwrap()));

    // AND: The "h1" port was closed by the child
    assert!(matches!(
        first.post_message(envelope(ChannelEvent::primitive("late"), "h1")),
        Err(ChannelError::PortClosed { .. })
    ));

    // WHEN: Envelopes tagged "h1" and "h2" arrive on the current port
    second
        .post_message(envelope(ChannelEvent::primitive("previous"), "h1"))
        .unwrap();
    second
        .post_message(envelope(ChannelEvent::primitive("current"), "h2"))
        .unwrap();

    // THEN: Only the "h2" envelope reaches the application
    assert_eq!(inbox.next().await, ChannelEvent::primitive("current"));
    inbox.assert_empty().await;
}
