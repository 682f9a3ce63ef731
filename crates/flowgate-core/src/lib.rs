//! # flowgate-core
//!
//! Foundation types shared by every other crate in the session-streaming
//! gateway: branded IDs, the transcript content-block vocabulary, timestamp
//! helpers, and the tracing subscriber bootstrap.

#![deny(unsafe_code)]

pub mod content;
pub mod ids;
pub mod logging;
pub mod time;

pub use content::{ContentBlock, Role, ToolStatus};
pub use ids::{ApprovalId, ConnectionId, SessionId};
