use crate::error::ChannelError;
use crate::transport::MessageChannel;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("Timed out waiting for port delivery")
        .expect("Port handler dropped")
}

/// **VALUE**: Verifies messages posted before a handler exists are delivered, in
/// order, once one is attached.
///
/// **WHY THIS MATTERS**: The parent posts on its port while the handshake is still
/// in flight. The child attaches its handler only after adopting the port. Anything
/// posted in between must neither be lost nor reordered.
///
/// **BUG THIS CATCHES**: Would catch a port that drops messages without a handler,
/// or a pump that drains out of order.
#[tokio::test]
async fn given_messages_posted_before_handler_when_handler_set_then_delivered_in_order() {
    // GIVEN: A channel with messages already posted to port2
    let MessageChannel { port1, mut port2 } = MessageChannel::new();
    for n in 0..5 {
        port1.post_message(json!(n)).unwrap();
    }

    // WHEN: port2 starts listening
    let (tx, mut rx) = mpsc::unbounded_channel();
    port2.set_handler(move |value| {
        let _ = tx.send(value);
    });

    // THEN: All five arrive in posting order
    for n in 0..5 {
        assert_eq!(next(&mut rx).await, json!(n));
    }
}

#[tokio::test]
async fn given_replaced_handler_when_message_arrives_then_only_new_handler_sees_it() {
    // GIVEN: A port whose handler is swapped
    let MessageChannel { port1, mut port2 } = MessageChannel::new();
    let (old_tx, mut old_rx) = mpsc::unbounded_channel();
    let (new_tx, mut new_rx) = mpsc::unbounded_channel();
    port2.set_handler(move |value| {
        let _ = old_tx.send(value);
    });
    port2.set_handler(move |value| {
        let _ = new_tx.send(value);
    });

    // WHEN: Posting
    port1.post_message(json!("hello")).unwrap();

    // THEN: Only the replacement handler is called
    assert_eq!(next(&mut new_rx).await, json!("hello"));
    assert!(old_rx.try_recv().is_err());
}

#[tokio::test]
async fn given_closed_port_when_posting_then_port_closed_error() {
    let MessageChannel { mut port1, port2: _port2 } = MessageChannel::new();

    port1.close();
    port1.close();
    let result = port1.post_message(json!(1));

    assert!(port1.is_closed());
    assert!(matches!(result, Err(ChannelError::PortClosed { .. })));
}

/// **VALUE**: Verifies a dropped peer makes posting fail instead of queueing forever.
///
/// **WHY THIS MATTERS**: When the parent releases a superseded port, the child's end
/// must notice. Otherwise replies to a dead session would pile up unobserved.
#[tokio::test]
async fn given_dropped_peer_when_posting_then_port_closed_error() {
    // GIVEN: port2 dropped
    let MessageChannel { port1, port2 } = MessageChannel::new();
    drop(port2);

    // WHEN: Posting from port1
    let result = port1.post_message(json!({ "late": true }));

    // THEN: PortClosed
    let error = result.unwrap_err();
    assert!(matches!(error, ChannelError::PortClosed { .. }));
    assert!(error.to_string().contains("is gone"));
}

#[test]
fn given_new_channel_when_inspecting_ports_then_ids_differ() {
    let channel = MessageChannel::new();

    assert_ne!(channel.port1.id(), channel.port2.id());
    assert!(!channel.port1.is_closed());
}
