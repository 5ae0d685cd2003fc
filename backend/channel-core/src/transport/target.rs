use crate::transport::browsing_context::BrowsingContext;

use std::sync::{Arc, PoisonError, RwLock};

use log::info;

/// Where a parent sends its handshake.
///
/// `content_window` returns `None` while the child context is not loaded; the
/// parent treats that as unreachable and retries.
pub trait HandshakeTarget: Send + Sync {
    fn content_window(&self) -> Option<BrowsingContext>;
}

impl HandshakeTarget for BrowsingContext {
    fn content_window(&self) -> Option<BrowsingContext> {
        Some(self.clone())
    }
}

/// A slot that a child context is loaded into and unloaded from, like an
/// embedded frame element. Clones share the slot.
#[derive(Clone, Default)]
pub struct FrameSlot {
    context: Arc<RwLock<Option<BrowsingContext>>>,
}

impl FrameSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `context` into the slot, replacing whatever was there.
    pub fn attach(&self, context: BrowsingContext) {
        info!("Frame loaded with context from {}", context.origin());
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = Some(context);
    }

    /// Unload the slot, returning the previous context.
    pub fn detach(&self) -> Option<BrowsingContext> {
        let previous = self
            .context
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!("Frame unloaded");
        }
        previous
    }

    pub fn is_loaded(&self) -> bool {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl HandshakeTarget for FrameSlot {
    fn content_window(&self) -> Option<BrowsingContext> {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
