use crate::error::channel::ChannelError;
use crate::transport::message_channel::MessagePort;

use common::ErrorLocation;
use models::Origin;

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, trace};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;

type Listener = Arc<dyn Fn(&mut BroadcastEvent) + Send + Sync + 'static>;

/// A message delivered through the broadcast primitive.
///
/// Ports transferred with the message are handed out at most once: the first
/// listener to call [`BroadcastEvent::take_port`] owns it. Ports nobody takes
/// are closed once every listener has run.
pub struct BroadcastEvent {
    origin: Origin,
    data: Value,
    ports: Vec<MessagePort>,
}

impl BroadcastEvent {
    /// Origin of the sending context.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Take ownership of the first transferred port, if any is left.
    pub fn take_port(&mut self) -> Option<MessagePort> {
        if self.ports.is_empty() {
            None
        } else {
            Some(self.ports.remove(0))
        }
    }
}

impl Debug for BroadcastEvent {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("BroadcastEvent")
            .field("origin", &self.origin)
            .field("data", &self.data)
            .field("ports", &self.ports.len())
            .finish()
    }
}

struct ContextInner {
    origin: Origin,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    dispatch_tx: mpsc::UnboundedSender<BroadcastEvent>,
}

impl ContextInner {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A context reachable through an origin-scoped broadcast primitive.
///
/// Messages posted to the context are delivered asynchronously, one at a time
/// and in posting order, to every listener registered at delivery time.
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct BrowsingContext {
    inner: Arc<ContextInner>,
}

impl BrowsingContext {
    /// Create a context served from `origin` and start its dispatcher task.
    pub fn new(origin: Origin) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ContextInner {
            origin,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            dispatch_tx,
        });

        TokioSpawn(dispatcher(Arc::downgrade(&inner), dispatch_rx));

        Self { inner }
    }

    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    /// Register a listener for every broadcast delivered to this context.
    ///
    /// The listener stays registered until the returned guard is released or
    /// dropped.
    pub fn add_listener<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(&mut BroadcastEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::new(listener)));
        trace!("Listener {id} registered on {}", self.inner.origin);

        ListenerGuard {
            context: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Post `data` (plus `transfer`) to this context.
    ///
    /// `sender` is the origin of the posting context and is what listeners see
    /// as the event origin. The message is only delivered if `target_origin`
    /// equals this context's origin; otherwise it is dropped and any
    /// transferred ports are closed.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::OriginMismatch`] if `target_origin` does not match
    /// - [`ChannelError::TargetUnreachable`] if the dispatcher has stopped
    #[track_caller]
    pub fn post_message(
        &self,
        data: Value,
        sender: &Origin,
        target_origin: &Origin,
        transfer: Vec<MessagePort>,
    ) -> Result<(), ChannelError> {
        if target_origin != &self.inner.origin {
            debug!(
                "Dropping broadcast addressed to {target_origin}, context origin is {}",
                self.inner.origin
            );
            return Err(ChannelError::OriginMismatch {
                message: format!(
                    "Target origin {target_origin} does not match context origin {}",
                    self.inner.origin
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let event = BroadcastEvent {
            origin: sender.clone(),
            data,
            ports: transfer,
        };

        self.inner
            .dispatch_tx
            .send(event)
            .map_err(|_| ChannelError::TargetUnreachable {
                message: format!("Context {} is no longer dispatching", self.inner.origin),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl Debug for BrowsingContext {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter
            .debug_struct("BrowsingContext")
            .field("origin", &self.inner.origin)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Registration of a broadcast listener. Releasing or dropping it deregisters
/// the listener.
#[must_use = "dropping the guard deregisters the listener"]
pub struct ListenerGuard {
    context: Weak<ContextInner>,
    id: Option<u64>,
}

impl ListenerGuard {
    /// Deregister now.
    pub fn release(mut self) {
        self.deregister();
    }

    fn deregister(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };

        if let Some(context) = self.context.upgrade() {
            context.listeners().retain(|(listener_id, _)| *listener_id != id);
            trace!("Listener {id} released from {}", context.origin);
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.deregister();
    }
}

/// Delivers broadcasts in order until every handle to the context is gone.
async fn dispatcher(context: Weak<ContextInner>, mut dispatch_rx: mpsc::UnboundedReceiver<BroadcastEvent>) {
    while let Some(mut event) = dispatch_rx.recv().await {
        let Some(context) = context.upgrade() else {
            break;
        };

        // Snapshot so listeners may register or release during delivery.
        let listeners: Vec<Listener> = context
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        drop(context);

        for listener in listeners {
            listener(&mut event);
        }

        if event.port_count() > 0 {
            trace!(
                "{} transferred port(s) from {} not taken, closing",
                event.port_count(),
                event.origin
            );
        }
    }
}
