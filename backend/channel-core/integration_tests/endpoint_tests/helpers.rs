//! Test helpers for endpoint integration tests.
//!
//! All endpoint tests run on a paused Tokio clock (`start_paused = true`), so
//! sleeps complete as soon as every task is idle and retry schedules are
//! deterministic.

use channel_core::retry::{AttemptLimit, RetryPolicy};
use channel_core::transport::{BroadcastEvent, ListenerGuard};
use channel_core::{
    BrowsingContext, ChildEndpoint, FrameSlot, MessagePort, ParentEndpoint, SessionIdGenerator,
};

use models::{ChannelEvent, Origin, PortMessage, SessionId};

use std::collections::VecDeque;

use std::time::Duration;

use backoff::backoff::Constant;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

pub const TRUSTED_ORIGIN: &str = "http://localhost:3000";
pub const UNTRUSTED_ORIGIN: &str = "https://evil.example";

/// Virtual time a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(30);

pub fn trusted_origin() -> Origin {
    Origin::parse(TRUSTED_ORIGIN).unwrap()
}

pub fn untrusted_origin() -> Origin {
    Origin::parse(UNTRUSTED_ORIGIN).unwrap()
}

/// Fixed-interval retry, optionally capped.
pub fn fixed_retry(interval_ms: u64, max_attempts: Option<u32>) -> RetryPolicy {
    let constant = Constant::new(Duration::from_millis(interval_ms));
    match max_attempts {
        Some(max) => Box::new(AttemptLimit::new(constant, max)),
        None => Box::new(constant),
    }
}

/// Hands out a fixed list of ids (`h1`, `h2`, ...), then falls back to `h<n>`.
pub struct ScriptedSessionIds {
    script: VecDeque<SessionId>,
    issued: u64,
}

impl ScriptedSessionIds {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            script: ids.iter().map(|id| SessionId::new(*id).unwrap()).collect(),
            issued: 0,
        }
    }
}

impl SessionIdGenerator for ScriptedSessionIds {
    fn generate(&mut self) -> SessionId {
        self.issued += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| SessionId::from_ordinal("h", 100 + self.issued))
    }
}

/// Let every spawned task run until the runtime is idle.
pub async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Collects events handed to an endpoint's `on_message`.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Inbox {
    pub fn new() -> (impl FnMut(ChannelEvent) + Send + 'static, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |event| {
            let _ = tx.send(event);
        };
        (handler, Self { rx })
    }

    pub async fn next(&mut self) -> ChannelEvent {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("Timed out waiting for a dispatched event")
            .expect("Endpoint dropped its handler")
    }

    /// Assert nothing was dispatched once the runtime is idle.
    pub async fn assert_empty(&mut self) {
        settle().await;
        if let Ok(event) = self.rx.try_recv() {
            panic!("Expected no dispatched event, got {event:?}");
        }
    }
}

/// Parent, child and the frame between them, all wired for the trusted origin.
pub struct Harness {
    pub context: BrowsingContext,
    pub parent: ParentEndpoint,
    pub parent_inbox: Inbox,
    pub child: ChildEndpoint,
    pub child_inbox: Inbox,
}

impl Harness {
    /// Child listening on a loaded frame; parent built but not connected.
    pub fn loaded() -> Self {
        Self::assemble(None)
    }

    /// Same as [`Harness::loaded`] with the parent drawing ids from `ids`.
    pub fn scripted(ids: &[&str]) -> Self {
        Self::assemble(Some(ScriptedSessionIds::new(ids)))
    }

    fn assemble(session_ids: Option<ScriptedSessionIds>) -> Self {
        let frame = FrameSlot::new();
        let context = BrowsingContext::new(trusted_origin());
        frame.attach(context.clone());

        let (child_handler, child_inbox) = Inbox::new();
        let child = ChildEndpoint::new(&context, trusted_origin(), child_handler);

        let (parent_handler, parent_inbox) = Inbox::new();
        let mut builder = ParentEndpoint::builder()
            .with_target(frame.clone())
            .with_retry_policy(fixed_retry(100, None))
            .with_on_message(parent_handler);
        if let Some(ids) = session_ids {
            builder = builder.with_session_ids(ids);
        }
        let parent = builder.build().unwrap();

        Self {
            context,
            parent,
            parent_inbox,
            child,
            child_inbox,
        }
    }
}

/// One broadcast observed on a context by a raw listener.
#[derive(Debug)]
pub struct Captured {
    pub origin: Origin,
    pub data: Value,
    pub port: Option<MessagePort>,
}

impl Captured {
    pub fn message(&self) -> PortMessage {
        PortMessage::from_value(self.data.clone()).unwrap()
    }
}

/// Stands in for a child: records every broadcast and takes its port.
pub struct RawListener {
    _guard: ListenerGuard,
    rx: mpsc::UnboundedReceiver<Captured>,
}

impl RawListener {
    pub fn attach(context: &BrowsingContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = context.add_listener(move |event: &mut BroadcastEvent| {
            let _ = tx.send(Captured {
                origin: event.origin().clone(),
                data: event.data().clone(),
                port: event.take_port(),
            });
        });

        Self { _guard: guard, rx }
    }

    pub async fn next(&mut self) -> Captured {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("Timed out waiting for a broadcast")
            .expect("Listener dropped")
    }

    pub async fn assert_empty(&mut self) {
        settle().await;
        if let Ok(captured) = self.rx.try_recv() {
            panic!("Expected no broadcast, got {captured:?}");
        }
    }
}

/// Handler for a raw port that forwards every value to the returned receiver.
pub fn port_inbox(port: &mut MessagePort) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    port.set_handler(move |value| {
        let _ = tx.send(value);
    });
    rx
}

pub async fn next_value(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(WAIT, rx.recv())
        .await
        .expect("Timed out waiting for a port message")
        .expect("Port closed")
}
