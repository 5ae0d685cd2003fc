//! Active side of the handshake.
//!
//! The parent owns session creation: every `connect`/`reconnect` that finds a
//! loaded target mints a new session id, creates a fresh [`MessageChannel`],
//! keeps `port1` and broadcasts the handshake together with `port2`. A session
//! becomes `Confirmed` only when the child echoes that exact id back over the
//! private port.

use crate::codec;
use crate::config::ChannelConfig;
use crate::endpoint::MessageHandler;
use crate::endpoint::status::{EndpointStatus, wait_for_state};
use crate::error::channel::ChannelError;
use crate::error::config::ConfigError;
use crate::protocol::{DropReason, Effect, ParentInput, ParentState, parent_transition};
use crate::retry::RetryPolicy;
use crate::session_id::{CounterSessionIds, SessionIdGenerator};
use crate::transport::{BrowsingContext, HandshakeTarget, MessageChannel, MessagePort};

use common::ErrorLocation;
use models::{ChannelEvent, Envelope, HandshakeMessage, Origin, PortMessage, Session, SessionId};

use std::collections::VecDeque;
use std::mem;
use std::panic::Location;
use std::sync::Arc;

use backoff::backoff::Backoff;
use log::{debug, info, log, trace, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;

pub type ParentStatus = EndpointStatus<ParentState>;

#[derive(Debug)]
enum ParentCommand {
    Connect,
    Reconnect,
    Post(ChannelEvent),
    Inbound(Value),
    RetryTick { generation: u64 },
    Close,
}

/// Data a transition's effects may consume.
enum Payload {
    Nothing,
    Target(BrowsingContext),
    Envelope(Envelope),
}

/// Builder for [`ParentEndpoint`].
///
/// Only the target is required. Everything else defaults from
/// [`ChannelConfig::default`].
#[derive(Default)]
pub struct ParentEndpointBuilder {
    target: Option<Arc<dyn HandshakeTarget>>,
    config: Option<ChannelConfig>,
    session_ids: Option<Box<dyn SessionIdGenerator>>,
    retry_policy: Option<RetryPolicy>,
    on_message: Option<MessageHandler>,
}

impl ParentEndpointBuilder {
    pub fn with_target(mut self, target: impl HandshakeTarget + 'static) -> Self {
        self.target = Some(Arc::new(target));
        self
    }

    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the id source (defaults to a process-wide counter using the
    /// configured prefix).
    pub fn with_session_ids(mut self, session_ids: impl SessionIdGenerator + 'static) -> Self {
        self.session_ids = Some(Box::new(session_ids));
        self
    }

    /// Override the retry schedule (defaults to `config.retry.build_policy()`).
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    pub fn with_on_message<F>(mut self, on_message: F) -> Self
    where
        F: FnMut(ChannelEvent) + Send + 'static,
    {
        self.on_message = Some(Box::new(on_message));
        self
    }

    /// Validate and start the endpoint task. Must be called within a Tokio
    /// runtime. The endpoint starts `Disconnected`; call
    /// [`ParentEndpoint::connect`] to begin.
    #[track_caller]
    pub fn build(self) -> Result<ParentEndpoint, ConfigError> {
        let target = self.target.ok_or_else(|| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: String::from("Handshake target is required"),
        })?;

        let config = self.config.unwrap_or_default();
        config.validate()?;
        let trusted_origin = config.trusted_origin()?;

        let session_ids = self
            .session_ids
            .unwrap_or_else(|| Box::new(CounterSessionIds::new(config.session_id_prefix.clone())));
        let retry = self
            .retry_policy
            .unwrap_or_else(|| config.retry.build_policy());
        let on_message = self.on_message.unwrap_or_else(|| Box::new(|_| {}));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ParentStatus::new(ParentState::Disconnected));

        let actor = ParentActor {
            target,
            trusted_origin,
            session_ids,
            retry,
            on_message,
            commands: command_tx.downgrade(),
            status: status_tx,
            state: ParentState::Disconnected,
            session: None,
            port: None,
            stale: VecDeque::with_capacity(config.stale_history),
            stale_limit: config.stale_history,
            retry_timer: None,
            retry_generation: 0,
        };

        TokioSpawn(actor.run(command_rx));

        Ok(ParentEndpoint {
            command_tx,
            status: status_rx,
        })
    }
}

/// Handle to a running parent endpoint.
///
/// All methods return immediately; effects happen on the endpoint task in
/// call order. Dropping the handle tears the endpoint down.
pub struct ParentEndpoint {
    command_tx: mpsc::UnboundedSender<ParentCommand>,
    status: watch::Receiver<ParentStatus>,
}

impl ParentEndpoint {
    pub fn builder() -> ParentEndpointBuilder {
        ParentEndpointBuilder::default()
    }

    /// Start establishing a session. If the target is not loaded yet the
    /// attempt is retried on the configured schedule.
    pub fn connect(&self) -> Result<(), ChannelError> {
        self.send(ParentCommand::Connect)
    }

    /// Mark the current session stale, drop its port, and connect afresh.
    /// Confirmations and envelopes carrying the old id are ignored from now on.
    pub fn reconnect(&self) -> Result<(), ChannelError> {
        self.send(ParentCommand::Reconnect)
    }

    /// Send `event` under the current session.
    ///
    /// Accepted while `Connecting`: the port buffers until the child attaches,
    /// so nothing sent for the current session is lost. Dropped if no session
    /// has been opened yet.
    pub fn post_message(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.send(ParentCommand::Post(event))
    }

    /// Tear down: cancel retries, release the port, stop the task.
    pub fn close(&self) -> Result<(), ChannelError> {
        self.send(ParentCommand::Close)
    }

    pub fn status(&self) -> ParentStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ParentState {
        self.status.borrow().state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.status.borrow().session_id().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ParentState::Connected
    }

    /// Watch every published status change.
    pub fn subscribe(&self) -> watch::Receiver<ParentStatus> {
        self.status.clone()
    }

    /// Resolve once the endpoint reaches `state`.
    pub async fn wait_for_state(&self, state: ParentState) -> Result<ParentStatus, ChannelError> {
        wait_for_state(self.status.clone(), state).await
    }

    #[track_caller]
    fn send(&self, command: ParentCommand) -> Result<(), ChannelError> {
        self.command_tx
            .send(command)
            .map_err(|e| ChannelError::EndpointClosed {
                message: format!("Parent endpoint has stopped, dropped {:?}", e.0),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// Owns all mutable parent state. Runs on its own task.
struct ParentActor {
    target: Arc<dyn HandshakeTarget>,
    trusted_origin: Origin,
    session_ids: Box<dyn SessionIdGenerator>,
    retry: RetryPolicy,
    on_message: MessageHandler,
    commands: mpsc::WeakUnboundedSender<ParentCommand>,
    status: watch::Sender<ParentStatus>,
    state: ParentState,
    session: Option<Session>,
    port: Option<MessagePort>,
    stale: VecDeque<SessionId>,
    stale_limit: usize,
    retry_timer: Option<JoinHandle<()>>,
    retry_generation: u64,
}

impl ParentActor {
    async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<ParentCommand>) {
        info!("Parent endpoint started, trusted origin {}", self.trusted_origin);

        while let Some(command) = command_rx.recv().await {
            match command {
                ParentCommand::Connect => {
                    let context = self.resolve_target();
                    let reachable = context.is_some();
                    self.step(ParentInput::Connect { reachable }, payload_for(context));
                }
                ParentCommand::Reconnect => {
                    info!("Reconnect requested");
                    let context = self.resolve_target();
                    let reachable = context.is_some();
                    self.step(ParentInput::Reconnect { reachable }, payload_for(context));
                }
                ParentCommand::RetryTick { generation } => {
                    if generation != self.retry_generation {
                        trace!("Ignoring retry tick from cancelled schedule {generation}");
                        continue;
                    }
                    let context = self.resolve_target();
                    let reachable = context.is_some();
                    self.step(ParentInput::RetryTick { reachable }, payload_for(context));
                }
                ParentCommand::Inbound(value) => self.on_inbound(value),
                ParentCommand::Post(event) => self.post(event),
                ParentCommand::Close => {
                    info!("Parent endpoint closing");
                    break;
                }
            }
        }

        self.step(ParentInput::Close, Payload::Nothing);
        info!("Parent endpoint stopped");
    }

    fn resolve_target(&self) -> Option<BrowsingContext> {
        let context = self.target.content_window();

        if context.is_none() {
            let error = ChannelError::TargetUnreachable {
                message: String::from("Target has no loaded context"),
                location: ErrorLocation::from(Location::caller()),
            };
            log!(error.severity(), "{error}");
        }

        context
    }

    fn on_inbound(&mut self, value: Value) {
        let message = match PortMessage::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                let error = ChannelError::from(e);
                log!(error.severity(), "Parent dropped inbound value: {error}");
                return;
            }
        };

        match message {
            PortMessage::Handshake(HandshakeMessage { session_id }) => {
                self.step(
                    ParentInput::Confirmation {
                        session_id: &session_id,
                    },
                    Payload::Nothing,
                );
            }
            PortMessage::Envelope(envelope) => {
                let session_id = envelope.session_id.clone();
                self.step(
                    ParentInput::Envelope {
                        session_id: &session_id,
                    },
                    Payload::Envelope(envelope),
                );
            }
        }
    }

    fn post(&mut self, event: ChannelEvent) {
        let (Some(session), Some(port)) = (self.session.as_ref(), self.port.as_ref()) else {
            debug!("No session open, dropping outbound {} event", event.kind());
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

    fn step(&mut self, input: ParentInput<'_>, mut payload: Payload) {
        let transition = parent_transition(self.state, self.session.as_ref(), input);
        let previous = self.state;
        self.state = transition.next;

        for effect in transition.effects {
            match effect {
                Effect::MarkStale => self.mark_stale(),
                Effect::ReleaseEndpoint => self.release_endpoint(),
                Effect::CancelRetry => self.cancel_retry(),
                Effect::OpenSession => {
                    if let Payload::Target(context) = mem::replace(&mut payload, Payload::Nothing)
                    {
                        self.open_session(&context);
                    }
                }
                Effect::ScheduleRetry => self.schedule_retry(),
                Effect::GiveUp => {
                    warn!("Retry policy exhausted, giving up on target; call reconnect to try again");
                }
                Effect::Confirm => self.confirm(),
                Effect::Dispatch => {
                    if let Payload::Envelope(envelope) =
                        mem::replace(&mut payload, Payload::Nothing)
                    {
                        self.dispatch(envelope);
                    }
                }
                Effect::Drop(reason) => self.log_drop(reason, &input),
                Effect::AdoptEndpoint | Effect::ReplyConfirmation => {}
            }
        }

        if previous != self.state {
            info!("Parent {previous} -> {}", self.state);
        }
        self.publish();
    }

    fn open_session(&mut self, context: &BrowsingContext) {
        let session_id = self.session_ids.generate();
        let MessageChannel {
            port1: mut local,
            port2: remote,
        } = MessageChannel::new();

        let commands = self.commands.clone();
        local.set_handler(move |value| {
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(ParentCommand::Inbound(value));
            }
        });

        self.retry.reset();
        self.session = Some(Session::pending(session_id.clone()));
        self.port = Some(local);

        let handshake = PortMessage::from(HandshakeMessage {
            session_id: session_id.clone(),
        });
        let delivered = handshake
            .to_value()
            .map_err(ChannelError::from)
            .and_then(|value| {
                context.post_message(value, &self.trusted_origin, &self.trusted_origin, vec![remote])
            });

        match delivered {
            Ok(()) => info!(
                "Session {session_id} opened, handshake sent to {}",
                context.origin()
            ),
            Err(error) => warn!("Handshake for session {session_id} not delivered: {error}"),
        }
    }

    fn confirm(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.confirm() {
                info!("Session {} confirmed", session.id());
            }
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
            Err(error) => log!(error.severity(), "Parent dropped envelope: {error}"),
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

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.retry_generation = self.retry_generation.wrapping_add(1);
        self.retry.reset();
    }

    fn schedule_retry(&mut self) {
        let Some(delay) = self.retry.next_backoff() else {
            self.step(ParentInput::RetryExhausted, Payload::Nothing);
            return;
        };

        debug!("Retrying connect in {delay:?}");

        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }

        let generation = self.retry_generation;
        let commands = self.commands.clone();
        self.retry_timer = Some(TokioSpawn(async move {
            TokioSleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(ParentCommand::RetryTick { generation });
            }
        }));
    }

    fn log_drop(&self, reason: DropReason, input: &ParentInput<'_>) {
        let tagged = match input {
            ParentInput::Confirmation { session_id } | ParentInput::Envelope { session_id } => {
                Some(*session_id)
            }
            _ => None,
        };

        match tagged {
            Some(session_id) if self.stale.contains(session_id) => {
                trace!("Dropped {input:?}: session {session_id} is stale");
            }
            _ => trace!("Dropped {input:?}: {reason:?}"),
        }
    }

    fn publish(&self) {
        self.status.send_replace(ParentStatus {
            state: self.state,
            session: self.session.clone(),
        });
    }
}

fn payload_for(context: Option<BrowsingContext>) -> Payload {
    context.map_or(Payload::Nothing, Payload::Target)
}
