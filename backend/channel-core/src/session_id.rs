//! Session id generation.
//!
//! Ids only need to tell one parent's sessions apart within a process, so the
//! default generator is a process-wide counter. [`UuidSessionIds`] is there for
//! hosts that would rather not hand out guessable ids.

use crate::config::DEFAULT_SESSION_ID_PREFIX;

use models::SessionId;

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(1);

/// Source of fresh session ids for a parent endpoint.
pub trait SessionIdGenerator: Send {
    /// Return an id distinct from every id this generator returned before.
    fn generate(&mut self) -> SessionId;
}

/// `<prefix><n>` with `n` drawn from a counter shared by the whole process.
///
/// Two generators with the same prefix never collide because they share the
/// counter.
#[derive(Debug, Clone)]
pub struct CounterSessionIds {
    prefix: String,
}

impl CounterSessionIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for CounterSessionIds {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_ID_PREFIX)
    }
}

impl SessionIdGenerator for CounterSessionIds {
    fn generate(&mut self) -> SessionId {
        let ordinal = NEXT_ORDINAL.fetch_add(1, Ordering::Relaxed);
        SessionId::from_ordinal(&self.prefix, ordinal)
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSessionIds;

impl SessionIdGenerator for UuidSessionIds {
    fn generate(&mut self) -> SessionId {
        SessionId::from_uuid(Uuid::new_v4())
    }
}
