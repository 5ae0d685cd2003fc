use crate::endpoint_tests::helpers::{
    Harness, RawListener, WAIT, next_value, port_inbox, trusted_origin,
};

use channel_core::{BrowsingContext, FrameSlot, ParentEndpoint, ParentState};
use models::{ChannelEvent, Envelope, PortMessage};

use serde_json::{Map, json};
use tokio::time::timeout;

/// **VALUE**: Messages posted while still `Connecting` reach the child, in order,
/// once it adopts the port.
///
/// **WHY THIS MATTERS**: Hosts post right after `connect` without waiting for
/// confirmation. The port buffers until the child attaches, so nothing sent for the
/// current session may be lost or reordered.
///
/// **BUG THIS CATCHES**: Would catch a parent that drops posts until `Connected`, or
/// a child that attaches its handler after draining part of the queue.
#[tokio::test(start_paused = true)]
async fn given_posts_before_confirmation_when_child_adopts_then_delivered_in_order() {
    // GIVEN: A loaded child
    let mut harness = Harness::loaded();

    // WHEN: Connecting and posting immediately
    harness.parent.connect().unwrap();
    for n in 0..10 {
        harness
            .parent
            .post_message(ChannelEvent::primitive(n.to_string()))
            .unwrap();
    }

    // THEN: All ten arrive in order
    for n in 0..10 {
        assert_eq!(
            harness.child_inbox.next().await,
            ChannelEvent::primitive(n.to_string())
        );
    }
    timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn given_connected_pair_when_mixed_events_posted_then_child_sees_same_sequence() {
    // GIVEN: A connected pair
    let mut harness = Harness::loaded();
    harness.parent.connect().unwrap();
    timeout(WAIT, harness.parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();

    // WHEN: Interleaving primitive and structured payloads
    let mut sent = Vec::new();
    for n in 0..5_u64 {
        let mut payload = Map::new();
        payload.insert(String::from("seq"), json!(n));
        sent.push(ChannelEvent::primitive(format!("p{n}")));
        sent.push(ChannelEvent::data(payload));
    }
    for event in &sent {
        harness.parent.post_message(event.clone()).unwrap();
    }

    // THEN: Same sequence on the other side
    for expected in sent {
        assert_eq!(harness.child_inbox.next().await, expected);
    }
}

/// **VALUE**: What actually goes over the port while `Connecting`: envelopes tagged
/// with the pending session, in posting order.
#[tokio::test(start_paused = true)]
async fn given_connecting_parent_when_posting_then_port_carries_tagged_envelopes() {
    // GIVEN: A raw child that captures the handshake and port
    let context = BrowsingContext::new(trusted_origin());
    let frame = FrameSlot::new();
    frame.attach(context.clone());
    let mut raw = RawListener::attach(&context);
    let parent = ParentEndpoint::builder()
        .with_target(frame)
        .build()
        .unwrap();

    // WHEN: Posting before any confirmation
    parent.connect().unwrap();
    parent.post_message(ChannelEvent::primitive("a")).unwrap();
    parent.post_message(ChannelEvent::primitive("b")).unwrap();
    let mut handshake = raw.next().await;
    let session_id = handshake.message().session_id().clone();
    let mut port = handshake.port.take().unwrap();
    let mut values = port_inbox(&mut port);

    // THEN: Both envelopes, tagged with the pending session, in order
    for payload in ["a", "b"] {
        let value = next_value(&mut values).await;
        assert_eq!(
            PortMessage::from_value(value).unwrap(),
            PortMessage::Envelope(Envelope {
                session_id: session_id.clone(),
                event: ChannelEvent::primitive(payload),
            })
        );
    }
    assert_eq!(handshake.origin, trusted_origin());
    assert_eq!(parent.state(), ParentState::Connecting);
}
