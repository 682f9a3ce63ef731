//! # flowgate-streaming
//!
//! Translates runtime events into the block/tool-scoped subset of the
//! client-facing frame vocabulary, maintaining per-session (and per-child)
//! block index and chronological order bookkeeping. The session task owns
//! one [`StreamingAdapter`] and drives it serially; there is no internal
//! locking.

#![deny(unsafe_code)]

pub mod adapter;
pub mod events;
pub mod frames;

pub use adapter::StreamingAdapter;
pub use events::{BlockType, Nesting, RuntimeEvent};
pub use frames::Frame;
