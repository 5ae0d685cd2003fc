use crate::endpoint_tests::helpers::{Inbox, WAIT, fixed_retry, settle, trusted_origin};

use channel_core::{
    BrowsingContext, ChildEndpoint, ChildState, FrameSlot, ParentEndpoint, ParentState,
};
use models::ChannelEvent;

use std::time::Duration;

use tokio::time::{sleep, timeout};

/// **VALUE**: Connect before the child is loaded, then load it. The parent keeps
/// retrying and connects once the frame has a context.
///
/// **WHY THIS MATTERS**: Hosts usually call `connect` as soon as they create the
/// frame, well before the child page has loaded. Without retry the first attempt
/// would fail and the channel would never come up.
///
/// **BUG THIS CATCHES**: Would catch a parent that gives up after one attempt, or a
/// retry tick that never re-resolves the target.
#[tokio::test(start_paused = true)]
async fn given_unloaded_frame_when_connecting_then_retries_until_loaded() {
    // GIVEN: An empty frame and a parent retrying every 100ms
    let frame = FrameSlot::new();
    let parent = ParentEndpoint::builder()
        .with_target(frame.clone())
        .with_retry_policy(fixed_retry(100, None))
        .build()
        .unwrap();

    // WHEN: Connecting, then loading the child 350ms later
    parent.connect().unwrap();
    settle().await;
    assert_eq!(parent.state(), ParentState::Connecting);
    assert!(parent.session_id().is_none());

    sleep(Duration::from_millis(350)).await;
    let context = BrowsingContext::new(trusted_origin());
    let (handler, mut child_inbox) = Inbox::new();
    let child = ChildEndpoint::new(&context, trusted_origin(), handler);
    frame.attach(context);

    // THEN: Connected on the next tick
    timeout(WAIT, parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child.state(), ChildState::Confirmed);

    parent
        .post_message(ChannelEvent::primitive("loaded"))
        .unwrap();
    assert_eq!(child_inbox.next().await, ChannelEvent::primitive("loaded"));
}

/// **VALUE**: An exhausted retry policy moves the parent back to `Disconnected`;
/// `reconnect` starts over once the frame is loaded.
///
/// **WHY THIS MATTERS**: A capped policy must end somewhere observable, otherwise
/// the host cannot tell "still trying" from "gave up".
#[tokio::test(start_paused = true)]
async fn given_capped_retry_when_frame_never_loads_then_disconnected_and_reconnect_recovers() {
    // GIVEN: Three attempts, 100ms apart
    let frame = FrameSlot::new();
    let parent = ParentEndpoint::builder()
        .with_target(frame.clone())
        .with_retry_policy(fixed_retry(100, Some(3)))
        .build()
        .unwrap();

    // WHEN: Connecting with nothing loaded
    parent.connect().unwrap();
    settle().await;
    assert_eq!(parent.state(), ParentState::Connecting);

    // THEN: Gives up
    timeout(WAIT, parent.wait_for_state(ParentState::Disconnected))
        .await
        .unwrap()
        .unwrap();
    assert!(parent.session_id().is_none());

    // AND: Recovers via reconnect once loaded
    let context = BrowsingContext::new(trusted_origin());
    let (handler, _inbox) = Inbox::new();
    let _child = ChildEndpoint::new(&context, trusted_origin(), handler);
    frame.attach(context);
    parent.reconnect().unwrap();
    timeout(WAIT, parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
}

/// **VALUE**: Closing while waiting for the target cancels the schedule.
///
/// **BUG THIS CATCHES**: Would catch a retry timer that outlives its endpoint and
/// opens a session after the host tore everything down.
#[tokio::test(start_paused = true)]
async fn given_pending_retry_when_closed_then_no_session_opened_later() {
    // GIVEN: A parent retrying against an empty frame
    let frame = FrameSlot::new();
    let parent = ParentEndpoint::builder()
        .with_target(frame.clone())
        .with_retry_policy(fixed_retry(100, None))
        .build()
        .unwrap();
    parent.connect().unwrap();
    settle().await;

    // WHEN: Closing, then loading the child
    parent.close().unwrap();
    settle().await;
    let context = BrowsingContext::new(trusted_origin());
    let (handler, _inbox) = Inbox::new();
    let child = ChildEndpoint::new(&context, trusted_origin(), handler);
    frame.attach(context);
    sleep(Duration::from_secs(5)).await;

    // THEN: Nobody ever shook hands
    assert_eq!(parent.state(), ParentState::Disconnected);
    assert_eq!(child.state(), ChildState::AwaitingHandshake);
}

#[tokio::test(start_paused = true)]
async fn given_pending_retry_when_reconnect_called_then_single_session_results() {
    // GIVEN: A parent retrying against an empty frame
    let frame = FrameSlot::new();
    let parent = ParentEndpoint::builder()
        .with_target(frame.clone())
        .with_retry_policy(fixed_retry(100, None))
        .build()
        .unwrap();
    parent.connect().unwrap();
    settle().await;

    // WHEN: The frame loads and the host reconnects before the next tick
    let context = BrowsingContext::new(trusted_origin());
    let (handler, _inbox) = Inbox::new();
    let child = ChildEndpoint::new(&context, trusted_origin(), handler);
    frame.attach(context);
    parent.reconnect().unwrap();

    // THEN: Connected once; the old tick does not open another session
    let status = timeout(WAIT, parent.wait_for_state(ParentState::Connected))
        .await
        .unwrap()
        .unwrap();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(parent.session_id(), status.session_id().cloned());
    assert_eq!(child.session_id(), status.session_id().cloned());
}
