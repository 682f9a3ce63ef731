//! # flowgate-artifacts
//!
//! Derives a file-change timeline from tool-call observations: subscribes to
//! completed tool calls, extracts affected paths and before/after content for
//! file-mutating tools, and computes a bounded unified diff.

#![deny(unsafe_code)]

pub mod ledger;
pub mod types;

pub use ledger::ArtifactLedger;
pub use types::{ArtifactEntry, ArtifactOperation};
