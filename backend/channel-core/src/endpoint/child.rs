//! Passive side of the handshake.
//!
//! The child listens on its own [`BrowsingContext`] for handshakes from the
//! trusted origin. Every accepted handshake supersedes the previous session:
//! the old port is closed, the transferred one adopted, and the handshake is
//! echoed back over it as confirmation.

use crate::codec;
use crate::config::ChannelConfig;
use crate::endpoint::MessageHandler;
use crate::endpoint::status::{EndpointStatus, wait_for_state};
use crate::error::channel::ChannelError;
use crate::error::config::ConfigError;
use crate::protocol::{ChildInput, ChildState, DropReason, Effect, child_transition};
use crate::transport::{BroadcastEvent, BrowsingContext, ListenerGuard, MessagePort};

use common::ErrorLocation;
use models::{ChannelEvent, Envelope, HandshakeMessage, Origin, PortMessage, Session, SessionId};

use std::collections::VecDeque;
use std::mem;
use std::panic::Location;

use log::{debug, info, log, trace, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, watch};

pub type ChildStatus = EndpointStatus<ChildState>;

#[derive(Debug)]
enum ChildCommand {
    Handshake {
        origin: Origin,
        handshake: HandshakeMessage,
        port: Option<MessagePort>,
    },
    Inbound(Value),
    Post(ChannelEvent),
    Close,
}

enum Payload {
    Nothing,
    Handshake {
        session_id: SessionId,
        port: Option<MessagePort>,
    },
    Envelope(Envelope),
}

/// Handle to a running child endpoint.
///
/// The broadcast listener is registered on construction, so the endpoint is
/// `AwaitingHandshake` immediately. Dropping the handle deregisters it.
pub struct ChildEndpoint {
    command_tx: mpsc::UnboundedSender<ChildCommand>,
    status: watch::Receiver<ChildStatus>,
}

impl ChildEndpoint {
    /// Listen on `context` for handshakes from `trusted_origin`. Must be called
    /// within a Tokio runtime.
    pub fn new<F>(context: &BrowsingContext, trusted_origin: Origin, on_message: F) -> Self
    where
        F: FnMut(ChannelEvent) + Send + 'static,
    {
        let stale_limit = ChannelConfig::default().stale_history;
        Self::spawn(context, trusted_origin, stale_limit, Box::new(on_message))
    }

    /// Like [`ChildEndpoint::new`], taking the trusted origin and stale history
    /// size from `config`.
    pub fn from_config<F>(
        context: &BrowsingContext,
        config: &ChannelConfig,
        on_message: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnMut(ChannelEvent) + Send + 'static,
    {
        config.validate()?;
        let trusted_origin = config.trusted_origin()?;

        Ok(Self::spawn(
            context,
            trusted_origin,
            config.stale_history,
            Box::new(on_message),
        ))
    }

    fn spawn(
        context: &BrowsingContext,
        trusted_origin: Origin,
        stale_limit: usize,
        on_message: MessageHandler,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ChildStatus::new(ChildState::Idle));

        let commands = command_tx.downgrade();
        let listener_origin = trusted_origin.clone();
        let listener = context
            .add_listener(move |event| forward_handshake(&commands, &listener_origin, event));

        let mut actor = ChildActor {
            trusted_origin,
            on_message,
            commands: command_tx.downgrade(),
            status: status_tx,
            state: ChildState::Idle,
            session: None,
            port: None,
            stale: VecDeque::with_capacity(stale_limit),
            stale_limit,
            listener: Some(listener),
        };
        actor.step(ChildInput::Listen, Payload::Nothing);

        TokioSpawn(actor.run(command_rx));

        Self {
            command_tx,
            status: status_rx,
        }
    }

    /// Send `event` under the current session. Dropped if no handshake has
    /// been accepted yet.
    pub fn post_message(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.send(ChildCommand::Post(event))
    }

    /// Stop listening, release the port, stop the task.
    pub fn close(&self) -> Result<(), ChannelError> {
        self.send(ChildCommand::Close)
    }

    pub fn status(&self) -> ChildStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ChildState {
        self.status.borrow().state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.status.borrow().session_id().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChildState::Confirmed
    }

    pub fn subscribe(&self) -> watch::Receiver<ChildStatus> {
        self.status.clone()
    }

    pub async fn wait_for_state(&self, state: ChildState) -> Result<ChildStatus, ChannelError> {
        wait_for_state(self.status.clone(), state).await
    }

    #[track_caller]
    fn send(&self, command: ChildCommand) -> Result<(), ChannelError> {
        self.command_tx
            .send(command)
            .map_err(|e| ChannelError::EndpointClosed {
                message: format!("Child endpoint has stopped, dropped {:?}", e.0),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// Broadcast listener body. Only handshake-shaped messages are forwarded; the
/// rest belong to other listeners on the same context. Ports are taken only
/// from the trusted origin, so a foreign handshake keeps its port for whoever
/// else is listening.
fn forward_handshake(
    commands: &mpsc::WeakUnboundedSender<ChildCommand>,
    trusted_origin: &Origin,
    event: &mut BroadcastEvent,
) {
    let handshake = match PortMessage::from_value(event.data().clone()) {
        Ok(PortMessage::Handshake(handshake)) => handshake,
        Ok(PortMessage::Envelope(_)) => {
            trace!("Ignoring envelope broadcast from {}", event.origin());
            return;
        }
        Err(e) => {
            trace!("Ignoring broadcast from {}: {e}", event.origin());
            return;
        }
    };

    let Some(commands) = commands.upgrade() else {
        return;
    };

    let port = if event.origin() == trusted_origin {
        event.take_port()
    } else {
        None
    };

    let _ = commands.send(ChildCommand::Handshake {
        origin: event.origin().clone(),
        handshake,
        port,
    });
}

struct ChildActor {
    trusted_origin: Origin,
    on_message: MessageHandler,
    commands: mpsc::WeakUnboundedSender<ChildCommand>,
    status: watch::Sender<ChildStatus>,
    state: ChildState,
    session: Option<Session>,
    port: Option<MessagePort>,
    stale: VecDeque<SessionId>,
    stale_limit: usize,
    listener: Option<ListenerGuard>,
}

impl ChildActor {
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<ChildCommand>) {
        info!("Child endpoint listening for {}", self.trusted_origin);

        while let Some(command) = command_rx.recv().await {
            match command {
                ChildCommand::Handshake {
                    origin,
                    handshake,
                    port,
                } => self.on_handshake(origin, handshake, port),
                ChildCommand::Inbound(value) => self.on_inbound(value),
                ChildCommand::Post(event) => self.post(event),
                ChildCommand::Close => {
                    info!("Child endpoint closing");
                    break;
                }
            }
        }

        self.step(ChildInput::Close, Payload::Nothing);
        info!("Child endpoint stopped");
    }

    fn on_handshake(
        &mut self,
        origin: Origin,
        handshake: HandshakeMessage,
        port: Option<MessagePort>,
    ) {
        let origin_trusted = origin == self.trusted_origin;
        if !origin_trusted {
            let error = ChannelError::OriginMismatch {
                message: format!(
                    "Handshake from {origin} rejected, trusted origin is {}",
                    self.trusted_origin
                ),
                location: ErrorLocation::from(Location::caller()),
            };
            log!(error.severity(), "{error}");
        } else if port.is_none() {
            let error = ChannelError::MissingEndpoint {
                message: format!(
                    "Handshake {} from {origin} carried no port",
                    handshake.session_id
                ),
                location: ErrorLocation::from(Location::caller()),
            };
            log!(error.severity(), "{error}");
        }

        let input = ChildInput::Handshake {
            origin_trusted,
            has_endpoint: port.is_some(),
        };
        self.step(
            input,
            Payload::Handshake {
                session_id: handshake.session_id,
                port,
            },
        );
    }

    fn on_inbound(&mut self, value: Value) {
        let message = match PortMessage::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                let error = ChannelError::from(e);
                log!(error.severity(), "Child dropped inbound value: {error}");
                return;
            }
        };

        match message {
            PortMessage::Envelope(envelope) => {
                let session_id = envelope.session_id.clone();
                self.step(
                    ChildInput::Envelope {
                        session_id: &session_id,
                    },
                    Payload::Envelope(envelope),
                );
            }
            PortMessage::Handshake(HandshakeMessage { session_id }) => {
                trace!("Ignoring handshake {session_id} received over the port");
            }
        }
    }

    fn post(&mut self, event: ChannelEvent) {
        let (Some(session), Some(port)) = (self.session.as_ref(), self.port.as_ref()) else {
            debug!("No session adopted, dropping outbound {} event", event.kind());
            return;
        };

        let kind = event.kind();
        let envelope = codec::encode(event, session.id());
        let sent = PortMessage::from(envelope)
            .to_value()
            .map_err(ChannelError::from)
            .and_then(|value| port.post_message(value));

        match sent {
            Ok(()) => trace!("Sent {kind} event on session {}", session.id()),
            Err(error) => log!(error.severity(), "Outbound {kind} event not sent: {error}"),
        }
    }

    fn step(&mut self, input: ChildInput<'_>, mut payload: Payload) {
        let current = self.session.as_ref().map(|session| session.id().clone());
        let transition = child_transition(self.state, current.as_ref(), input);
        let previous = self.state;
        self.state = transition.next;

        for effect in transition.effects {
            match effect {
                Effect::MarkStale => self.mark_stale(),
                Effect::ReleaseEndpoint => self.release_endpoint(),
                Effect::AdoptEndpoint => {
                    if let Payload::Handshake {
                        session_id,
                        port: Some(port),
                    } = mem::replace(&mut payload, Payload::Nothing)
                    {
                        self.adopt(session_id, port);
                    }
                }
                Effect::ReplyConfirmation => self.reply_confirmation(),
                Effect::Dispatch => {
                    if let Payload::Envelope(envelope) =
                        mem::replace(&mut payload, Payload::Nothing)
                    {
                        self.dispatch(envelope);
                    }
                }
                Effect::Drop(reason) => self.log_drop(reason, &input),
                Effect::CancelRetry
                | Effect::OpenSession
                | Effect::ScheduleRetry
                | Effect::GiveUp
                | Effect::Confirm => {}
            }
        }

        if matches!(input, ChildInput::Close) {
            if let Some(listener) = self.listener.take() {
                listener.release();
            }
        }

        if previous != self.state {
            info!("Child {previous} -> {}", self.state);
        }
        self.publish();
    }

    fn adopt(&mut self, session_id: SessionId, mut port: MessagePort) {
        let commands = self.commands.clone();
        port.set_handler(move |value| {
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(ChildCommand::Inbound(value));
            }
        });

        info!("Adopted session {session_id} on {}", port.id());
        self.session = Some(Session::confirmed(session_id));
        self.port = Some(port);
    }

    fn reply_confirmation(&self) {
        let (Some(session), Some(port)) = (self.session.as_ref(), self.port.as_ref()) else {
            return;
        };

        let confirmation = PortMessage::from(HandshakeMessage {
            session_id: session.id().clone(),
        });
        let sent = confirmation
            .to_value()
            .map_err(ChannelError::from)
            .and_then(|value| port.post_message(value));

        if let Err(error) = sent {
            warn!("Confirmation for session {} not sent: {error}", session.id());
        }
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        match codec::decode(envelope, session.id()) {
            Ok(event) => {
                trace!("Dispatching {} event", event.kind());
                (self.on_message)(event);
            }
            Err(error) => log!(error.severity(), "Child dropped envelope: {error}"),
        }
    }

    fn mark_stale(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.mark_stale();
        info!("Session {} superseded", session.id());

        if self.stale_limit == 0 {
            return;
        }
        if self.stale.len() == self.stale_limit {
            self.stale.pop_front();
        }
        self.stale.push_back(session.id().clone());
    }

    fn release_endpoint(&mut self) {
        if let Some(mut port) = self.port.take() {
            debug!("Releasing {}", port.id());
            port.close();
        }
    }

    fn log_drop(&self, reason: DropReason, input: &ChildInput<'_>) {
        match input {
            ChildInput::Envelope { session_id } if self.stale.contains(session_id) => {
                trace!("Dropped envelope: session {session_id} is stale");
            }
            _ => trace!("Dropped {input:?}: {reason:?}"),
        }
    }

    fn publish(&self) {
        self.status.send_replace(ChildStatus {
            state: self.state,
            session: self.session.clone(),
        });
    }
}
