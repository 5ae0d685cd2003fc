//! Plays both pages in one process: a host that connects before its frame has
//! loaded, and a child that answers every timestamp with a dated record.

use crate::error::PortbridgeError;

use channel_core::{
    BrowsingContext, ChannelConfig, ChildEndpoint, FrameSlot, ParentEndpoint, ParentState,
};
use common::ErrorLocation;
use models::{ChannelEvent, SessionId};

use std::panic::Location;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use humantime::format_rfc3339_millis;
use log::info;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const DATE_KEY: &str = "date";

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// How long the frame stays empty after the host calls `connect`.
    pub frame_load_delay: Duration,
    /// Timestamp/record exchanges per session.
    pub rounds: usize,
    /// Limit for each step that waits on the other side.
    pub step_timeout: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            frame_load_delay: Duration::from_millis(300),
            rounds: 3,
            step_timeout: Duration::from_secs(5),
        }
    }
}

/// What each side saw, per session, in arrival order.
#[derive(Debug, Default)]
pub struct DemoReport {
    pub sessions: Vec<SessionId>,
    pub child_received: Vec<ChannelEvent>,
    pub parent_received: Vec<ChannelEvent>,
}

/// Run one connect, one reconnect, and `options.rounds` exchanges on each
/// session, then close both ends.
pub async fn run(
    config: &ChannelConfig,
    options: &DemoOptions,
) -> Result<DemoReport, PortbridgeError> {
    let mut report = DemoReport::default();
    let frame = FrameSlot::new();

    let (parent_tx, mut parent_rx) = mpsc::unbounded_channel();
    let parent = ParentEndpoint::builder()
        .with_target(frame.clone())
        .with_config(config.clone())
        .with_on_message(move |event| {
            let _ = parent_tx.send(event);
        })
        .build()?;

    info!("Host connecting before the frame has loaded");
    parent.connect()?;
    sleep(options.frame_load_delay).await;

    let context = BrowsingContext::new(config.trusted_origin()?);
    let (child_tx, mut child_rx) = mpsc::unbounded_channel();
    let child = ChildEndpoint::from_config(&context, config, move |event| {
        let _ = child_tx.send(event);
    })?;
    frame.attach(context);

    let first = wait_for_new_session(&parent, None, options.step_timeout).await?;
    report.sessions.push(first.clone());

    exchange(&parent, &child, &mut parent_rx, &mut child_rx, options, &mut report).await?;

    info!("Host reconnecting");
    parent.reconnect()?;
    let second = wait_for_new_session(&parent, Some(&first), options.step_timeout).await?;
    report.sessions.push(second);

    exchange(&parent, &child, &mut parent_rx, &mut child_rx, options, &mut report).await?;

    parent.close()?;
    child.close()?;
    info!(
        "Demo finished: {} sessions, child received {}, host received {}",
        report.sessions.len(),
        report.child_received.len(),
        report.parent_received.len()
    );

    Ok(report)
}

async fn wait_for_new_session(
    parent: &ParentEndpoint,
    previous: Option<&SessionId>,
    step_timeout: Duration,
) -> Result<SessionId, PortbridgeError> {
    let mut status = parent.subscribe();
    let connected = status.wait_for(|current| {
        current.state == ParentState::Connected && current.session_id() != previous
    });

    let reached = timeout(step_timeout, connected)
        .await
        .map_err(|_| PortbridgeError::Timeout {
            message: format!("Host not connected after {step_timeout:?}"),
            location: ErrorLocation::from(Location::caller()),
        })?
        .map_err(|_| PortbridgeError::Channel {
            message: String::from("Host endpoint stopped while connecting"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    reached
        .session_id()
        .cloned()
        .ok_or_else(|| PortbridgeError::Portbridge {
            message: String::from("Connected without a session"),
            location: ErrorLocation::from(Location::caller()),
        })
}

async fn exchange(
    parent: &ParentEndpoint,
    child: &ChildEndpoint,
    parent_rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    child_rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    options: &DemoOptions,
    report: &mut DemoReport,
) -> Result<(), PortbridgeError> {
    for _ in 0..options.rounds {
        let now = SystemTime::now();
        parent.post_message(ChannelEvent::primitive(format_rfc3339_millis(now).to_string()))?;

        let received = receive(child_rx, options.step_timeout, "child").await?;
        info!("Child received {received:?}");
        report.child_received.push(received);

        child.post_message(ChannelEvent::data(dated_record(now)))?;

        let answered = receive(parent_rx, options.step_timeout, "host").await?;
        info!("Host received {answered:?}");
        report.parent_received.push(answered);
    }

    Ok(())
}

async fn receive(
    rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    step_timeout: Duration,
    side: &str,
) -> Result<ChannelEvent, PortbridgeError> {
    timeout(step_timeout, rx.recv())
        .await
        .map_err(|_| PortbridgeError::Timeout {
            message: format!("Nothing reached the {side} within {step_timeout:?}"),
            location: ErrorLocation::from(Location::caller()),
        })?
        .ok_or_else(|| PortbridgeError::Channel {
            message: format!("The {side} endpoint stopped"),
            location: ErrorLocation::from(Location::caller()),
        })
}

/// `{ "date": <unix millis> }`, saturating at `u64::MAX`.
pub fn dated_record(at: SystemTime) -> Map<String, Value> {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();

    let mut record = Map::new();
    record.insert(String::from(DATE_KEY), Value::from(millis));
    record
}
