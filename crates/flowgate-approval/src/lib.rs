//! # flowgate-approval
//!
//! Correlates pending tool-approval requests with client responses:
//! timeout/default resolution and per-session "always" caching keyed by a
//! stable fingerprint of the prompt and its options.

#![deny(unsafe_code)]

pub mod broker;
pub mod errors;

pub use broker::{fingerprint, ApprovalBroker, ApprovalSink};
pub use errors::{ApprovalError, Result};
