use crate::error::channel::ChannelError;

use common::ErrorLocation;

use std::fmt::{Debug, Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::trace;
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

static NEXT_PORT_ID: AtomicU64 = AtomicU64::new(1);

type PortHandler = Box<dyn FnMut(Value) + Send + 'static>;

/// Process-unique port identifier, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(u64);

impl Display for PortId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "port#{}", self.0)
    }
}

/// A pair of entangled ports. Whatever is posted on one arrives at the other.
pub struct MessageChannel {
    pub port1: MessagePort,
    pub port2: MessagePort,
}

impl MessageChannel {
    pub fn new() -> Self {
        let (to_port2, port2_inbound) = mpsc::unbounded_channel();
        let (to_port1, port1_inbound) = mpsc::unbounded_channel();

        Self {
            port1: MessagePort::new(to_port2, port1_inbound),
            port2: MessagePort::new(to_port1, port2_inbound),
        }
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// One half of a [`MessageChannel`].
///
/// Ports are owned, not shared: transferring a port moves it. Messages that
/// arrive before [`MessagePort::set_handler`] is called are queued and
/// delivered in order once a handler is attached. Dropping a port closes it.
pub struct MessagePort {
    id: PortId,
    outbound: Option<mpsc::UnboundedSender<Value>>,
    inbound: Option<mpsc::UnboundedReceiver<Value>>,
    handler: Arc<Mutex<Option<PortHandler>>>,
    pump: Option<JoinHandle<()>>,
}

impl MessagePort {
    fn new(outbound: mpsc::UnboundedSender<Value>, inbound: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            id: PortId(NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed)),
            outbound: Some(outbound),
            inbound: Some(inbound),
            handler: Arc::new(Mutex::new(None)),
            pump: None,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_none()
    }

    /// Queue `value` for the peer port.
    ///
    /// # Errors
    ///
    /// [`ChannelError::PortClosed`] if this port was closed or the peer port
    /// has been closed or dropped.
    #[track_caller]
    pub fn post_message(&self, value: Value) -> Result<(), ChannelError> {
        let outbound = self.outbound.as_ref().ok_or_else(|| ChannelError::PortClosed {
            message: format!("{} is closed", self.id),
            location: ErrorLocation::from(Location::caller()),
        })?;

        outbound.send(value).map_err(|_| ChannelError::PortClosed {
            message: format!("Peer of {} is gone", self.id),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Install `handler` for inbound messages, replacing any previous one.
    ///
    /// The first call starts delivery, including anything queued so far. The
    /// handler runs on the port's delivery task and must not block.
    pub fn set_handler<F>(&mut self, handler: F)
    where
        F: FnMut(Value) + Send + 'static,
    {
        *lock(&self.handler) = Some(Box::new(handler));

        if self.pump.is_some() {
            return;
        }

        if let Some(mut inbound) = self.inbound.take() {
            let handler = Arc::clone(&self.handler);
            let id = self.id;

            self.pump = Some(TokioSpawn(async move {
                while let Some(value) = inbound.recv().await {
                    if let Some(handler) = lock(&handler).as_mut() {
                        handler(value);
                    }
                }
                trace!("{id} peer closed, delivery stopped");
            }));
        }
    }

    /// Stop delivery and disentangle from the peer. Idempotent.
    pub fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.inbound = None;
        self.outbound = None;
        *lock(&self.handler) = None;
    }
}

impl Drop for MessagePort {
    fn drop(&mut self) {
        self.close();
    }
}

impl Debug for MessagePort {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("MessagePort")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("started", &self.pump.is_some())
            .finish()
    }
}

fn lock(handler: &Mutex<Option<PortHandler>>) -> std::sync::MutexGuard<'_, Option<PortHandler>> {
    handler.lock().unwrap_or_else(PoisonError::into_inner)
}
