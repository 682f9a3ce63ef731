//! # flowgate-runtime
//!
//! Session manager: the boundary between the gateway and the external agent
//! runtime ("runtime collaborator"). Mounts bundles, tracks the live session
//! set, drives each session's streaming adapter, and enforces the
//! create/prompt/cancel/resume/list/delete/rename lifecycle.

#![deny(unsafe_code)]

pub mod collaborator;
pub mod errors;
pub mod manager;

pub use collaborator::{
    ApprovalRequester, DisplayLevel, DisplaySink, ExecuteRequest, MountPlan, RuntimeCollaborator, SessionHandle, SessionSinks,
    TracingDisplaySink,
};
pub use errors::{Result, RuntimeError};
pub use manager::{CreateConfig, CreateOutcome, FrameSink, SessionManager};
