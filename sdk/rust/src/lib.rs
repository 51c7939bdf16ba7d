//! Client-side chat session manager.
//!
//! Keeps at most one WebSocket open to a chat room behind the edge,
//! reconnects after abnormal closure, and dispatches typed inbound events
//! to a [`SessionHandler`].

pub mod config;
pub mod error;
pub mod events;
pub mod outbound;
pub mod session;

pub use config::{ReconnectLimit, ReconnectPolicy, SessionConfig};
pub use error::{FrameError, SessionError};
pub use events::{parse_frame, ChatMessage, InboundEvent, MessageId, ReactionUpdate};
pub use session::{ChatSession, ConnectionState, SessionHandler};
