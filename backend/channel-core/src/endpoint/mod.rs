//! The two ends of a channel.
//!
//! Each endpoint is an actor: one Tokio task owns the session, the port and
//! the retry timer, and processes commands strictly in arrival order. The
//! public handle only enqueues commands and reads the latest published
//! [`EndpointStatus`]. Port handlers, broadcast listeners and retry timers feed
//! the same queue through weak senders, so dropping the handle is enough to
//! wind the task down.
//!
//! # Lifecycle
//!
//! ```text
//! parent: Disconnected --connect--> Connecting --confirmation--> Connected
//!                 ^                    ^   |                          |
//!                 |                    +---+------- reconnect --------+
//!                 +----- close / retry policy exhausted
//!
//! child:  Idle --listen--> AwaitingHandshake --handshake--> Confirmed
//!                                                  (newer handshake supersedes)
//! ```

mod child;
mod parent;
mod status;

pub use child::{ChildEndpoint, ChildStatus};
pub use parent::{ParentEndpoint, ParentEndpointBuilder, ParentStatus};
pub use status::EndpointStatus;

use models::ChannelEvent;

/// Application callback for decoded inbound events.
pub type MessageHandler = Box<dyn FnMut(ChannelEvent) + Send + 'static>;
