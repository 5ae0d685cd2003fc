use portbridge::demo::{DemoOptions, dated_record, run};

use channel_core::ChannelConfig;
use models::ChannelEventKind;

use std::time::{Duration, UNIX_EPOCH};

/// **VALUE**: Runs the whole demo on a paused clock: late frame, connect, exchange,
/// reconnect, exchange, close.
///
/// **WHY THIS MATTERS**: This is the closest thing to an end-to-end test. It drives
/// retry, handshake, confirmation, envelope dispatch and reconnect through the
/// public API exactly as a host would.
///
/// **BUG THIS CATCHES**: Would catch any step of the flow hanging (the demo times
/// out), a reconnect that keeps the old session, or replies routed to the wrong side.
#[tokio::test(start_paused = true)]
async fn given_default_config_when_demo_runs_then_two_sessions_and_all_rounds_complete() {
    // GIVEN: Default config, a frame that loads late
    let config = ChannelConfig::default();
    let options = DemoOptions {
        frame_load_delay: Duration::from_millis(500),
        rounds: 2,
        step_timeout: Duration::from_secs(10),
    };

    // WHEN: Running the demo
    let report = run(&config, &options).await.unwrap();

    // THEN: Two distinct sessions
    assert_eq!(report.sessions.len(), 2);
    assert_ne!(report.sessions[0], report.sessions[1]);

    // AND: Every round delivered a timestamp one way and a record the other
    assert_eq!(report.child_received.len(), 4);
    assert_eq!(report.parent_received.len(), 4);
    assert!(
        report
            .child_received
            .iter()
            .all(|event| event.kind() == ChannelEventKind::Primitive)
    );
    assert!(
        report
            .parent_received
            .iter()
            .all(|event| event.kind() == ChannelEventKind::Data)
    );
}

#[tokio::test(start_paused = true)]
async fn given_wildcard_origin_when_demo_runs_then_config_error() {
    let mut config = ChannelConfig::default();
    config.trusted_origin = String::from("*");

    let result = run(&config, &DemoOptions::default()).await;

    assert!(matches!(
        result,
        Err(portbridge::error::PortbridgeError::Config { .. })
    ));
}

#[test]
fn given_instant_when_dated_then_record_holds_unix_millis() {
    let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);

    let record = dated_record(at);

    assert_eq!(record["date"], 1_700_000_000_123_u64);
}

/// **VALUE**: Instants past what `u64` millis can hold saturate instead of wrapping.
///
/// **BUG THIS CATCHES**: Would catch a truncating `as u64` cast, which turns a far
/// future date into a small, plausible looking one.
#[test]
fn given_instant_beyond_u64_millis_when_dated_then_saturates() {
    // GIVEN: An instant whose millisecond count exceeds u64::MAX
    let at = UNIX_EPOCH + Duration::from_secs(u64::MAX / 100);

    // WHEN: Dating it
    let record = dated_record(at);

    // THEN: Clamped to the largest representable value
    assert_eq!(record["date"], u64::MAX);
}
