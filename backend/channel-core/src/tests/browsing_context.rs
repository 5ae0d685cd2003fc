use crate::error::ChannelError;
use crate::transport::{BrowsingContext, MessageChannel};

use models::Origin;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

fn origin(value: &str) -> Origin {
    Origin::parse(value).unwrap()
}

#[tokio::test]
async fn given_listener_when_message_posted_to_matching_origin_then_delivered_with_sender_origin() {
    // GIVEN: A child context with one listener
    let context = BrowsingContext::new(origin("http://localhost:3000"));
    let (tx, mut rx) = mpsc::unbounded_channel::<(Origin, Value)>();
    let _guard = context.add_listener(move |event| {
        let _ = tx.send((event.origin().clone(), event.data().clone()));
    });

    // WHEN: Posting addressed to the context's origin
    context
        .post_message(
            json!({ "hello": 1 }),
            &origin("http://localhost:3000"),
            &origin("http://localhost:3000"),
            Vec::new(),
        )
        .unwrap();

    // THEN: Delivered, tagged with the sender's origin
    let (sender, data) = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(sender.as_str(), "http://localhost:3000");
    assert_eq!(data, json!({ "hello": 1 }));
}

/// **VALUE**: Verifies a broadcast addressed to another origin is never delivered.
///
/// **WHY THIS MATTERS**: If the child's frame navigated elsewhere, the parent's
/// handshake, and the port with it, must not reach whoever is there now.
///
/// **BUG THIS CATCHES**: Would catch a dispatcher that ignores `target_origin`.
#[tokio::test]
async fn given_mismatched_target_origin_when_posting_then_rejected_and_not_delivered() {
    // GIVEN: A context at one origin with a listener
    let context = BrowsingContext::new(origin("https://other.example"));
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let _guard = context.add_listener(move |event| {
        let _ = tx.send(event.data().clone());
    });

    // WHEN: Posting addressed to a different origin
    let result = context.post_message(
        json!("secret"),
        &origin("http://localhost:3000"),
        &origin("http://localhost:3000"),
        Vec::new(),
    );

    // THEN: Error returned, nothing delivered
    assert!(matches!(result, Err(ChannelError::OriginMismatch { .. })));
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
}

#[tokio::test]
async fn given_released_guard_when_message_posted_then_listener_not_called() {
    // GIVEN: A listener registered then released
    let context = BrowsingContext::new(origin("http://localhost:3000"));
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let guard = context.add_listener(move |event| {
        let _ = tx.send(event.data().clone());
    });
    assert_eq!(context.listener_count(), 1);

    // WHEN: Releasing and posting
    guard.release();
    context
        .post_message(
            json!(1),
            &origin("http://localhost:3000"),
            &origin("http://localhost:3000"),
            Vec::new(),
        )
        .unwrap();

    // THEN: Deregistered; sender was dropped with the listener
    assert_eq!(context.listener_count(), 0);
    assert!(timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().is_none());
}

/// **VALUE**: Verifies a transferred port goes to exactly one listener.
///
/// **WHY THIS MATTERS**: Two parties holding the same session port would both see
/// the parent's private traffic.
#[tokio::test]
async fn given_two_listeners_when_port_transferred_then_only_first_takes_it() {
    // GIVEN: Two listeners reporting whether they got a port
    let context = BrowsingContext::new(origin("http://localhost:3000"));
    let (tx, mut rx) = mpsc::unbounded_channel::<(u8, bool)>();
    let first_tx = tx.clone();
    let _first = context.add_listener(move |event| {
        let _ = first_tx.send((1, event.take_port().is_some()));
    });
    let _second = context.add_listener(move |event| {
        let _ = tx.send((2, event.take_port().is_some()));
    });

    // WHEN: Broadcasting with one port
    let MessageChannel { port1: _port1, port2 } = MessageChannel::new();
    context
        .post_message(
            json!("with port"),
            &origin("http://localhost:3000"),
            &origin("http://localhost:3000"),
            vec![port2],
        )
        .unwrap();

    // THEN: Listeners run in registration order, only the first gets the port
    assert_eq!(timeout(RECV_TIMEOUT, rx.recv()).await.unwrap(), Some((1, true)));
    assert_eq!(timeout(RECV_TIMEOUT, rx.recv()).await.unwrap(), Some((2, false)));
}

#[tokio::test]
async fn given_untaken_port_when_broadcast_delivered_then_port_closed() {
    // GIVEN: A context with no listeners
    let context = BrowsingContext::new(origin("http://localhost:3000"));
    let MessageChannel { port1, port2 } = MessageChannel::new();

    // WHEN: Transferring port2 to nobody
    context
        .post_message(
            json!("orphan"),
            &origin("http://localhost:3000"),
            &origin("http://localhost:3000"),
            vec![port2],
        )
        .unwrap();
    let mut closed = false;
    for _ in 0..10 {
        tokio::task::yield_now().await;
        if port1.post_message(json!(1)).is_err() {
            closed = true;
            break;
        }
    }

    // THEN: port1 can no longer reach it
    assert!(closed, "Untaken port should be closed after dispatch");
}
