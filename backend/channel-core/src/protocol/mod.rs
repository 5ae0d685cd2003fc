//! Transition tables for both ends of the handshake.
//!
//! These are pure functions from `(state, session, input)` to
//! `(next state, effects)`. The endpoint tasks in [`crate::endpoint`] feed them
//! inputs and carry out the effects; nothing in here touches a transport.

mod transition;

pub use transition::{
    ChildInput, ChildState, DropReason, Effect, ParentInput, ParentState, Transition,
    child_transition, parent_transition,
};
