use crate::codec::{decode, encode};
use crate::error::ChannelError;

use models::{ChannelEvent, SessionId};

use serde_json::{Map, json};

fn id(value: &str) -> SessionId {
    SessionId::new(value).unwrap()
}

#[test]
fn given_event_when_encoded_then_envelope_carries_session_id() {
    // GIVEN: A primitive event and a session
    let event = ChannelEvent::primitive("1700000000000");

    // WHEN: Encoding
    let envelope = encode(event.clone(), &id("handshake1"));

    // THEN: The event is untouched and tagged with the session
    assert_eq!(envelope.session_id, id("handshake1"));
    assert_eq!(envelope.event, event);
}

/// **VALUE**: Verifies that decoding under the same session returns the
/// original event unchanged, including structured payloads.
///
/// **WHY THIS MATTERS**: This is the path every application message takes. If the
/// envelope altered the payload, the receiving callback would see different data
/// from what was posted.
#[test]
fn given_envelope_for_current_session_when_decoded_then_returns_original_event() {
    // GIVEN: A data event encoded under the current session
    let mut payload = Map::new();
    payload.insert(String::from("date"), json!(1_700_000_000_000_u64));
    let event = ChannelEvent::data(payload);
    let envelope = encode(event.clone(), &id("handshake2"));

    // WHEN: Decoding against the same session
    let decoded = decode(envelope, &id("handshake2")).unwrap();

    // THEN: Identical event
    assert_eq!(decoded, event);
}

/// **VALUE**: Verifies envelopes from any other session are rejected.
///
/// **WHY THIS MATTERS**: After a reconnect, messages still in flight on the old port
/// carry the old id. Delivering them would hand the application data from a session
/// it already abandoned.
///
/// **BUG THIS CATCHES**: Would catch an inverted comparison or a decode that ignores
/// the session id entirely.
#[test]
fn given_envelope_for_other_session_when_decoded_then_session_mismatch() {
    // GIVEN: An envelope from an older session
    let envelope = encode(ChannelEvent::primitive("late"), &id("handshake1"));

    // WHEN: Decoding against the current session
    let result = decode(envelope, &id("handshake2"));

    // THEN: Rejected as a mismatch, logged at trace
    let error = result.unwrap_err();
    assert!(matches!(error, ChannelError::SessionMismatch { .. }));
    assert_eq!(error.severity(), log::Level::Trace);
    assert!(error.to_string().contains("handshake1"));
    assert!(error.to_string().contains("handshake2"));
}
