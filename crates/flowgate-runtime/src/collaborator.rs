//! The runtime collaborator contract: the external agent runtime this
//! gateway fronts. It is consumed here, not implemented — a real deployment
//! plugs in the actual agent runtime; tests plug in a stand-in.

use std::time::Duration;

use async_trait::async_trait;
use flowgate_core::SessionId;
use flowgate_events::TranscriptEntry;
use flowgate_streaming::RuntimeEvent;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::Result;

/// Severity of a display-sink message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayLevel {
    Info,
    Warn,
    Error,
}

/// Sink for free-form diagnostic messages the collaborator wants surfaced.
pub trait DisplaySink: Send + Sync {
    fn display(&self, level: DisplayLevel, message: &str, source: Option<&str>);
}

/// Logs every message through `tracing`; the default sink when nothing else
/// wants to observe them.
#[derive(Default)]
pub struct TracingDisplaySink;

impl DisplaySink for TracingDisplaySink {
    fn display(&self, level: DisplayLevel, message: &str, source: Option<&str>) {
        match level {
            DisplayLevel::Info => tracing::info!(source, "{message}"),
            DisplayLevel::Warn => tracing::warn!(source, "{message}"),
            DisplayLevel::Error => tracing::error!(source, "{message}"),
        }
    }
}

/// What the collaborator calls to resolve a pending tool approval. Wraps an
/// [`flowgate_approval::ApprovalBroker`] plus the sink that notifies the
/// client a decision is pending.
#[async_trait]
pub trait ApprovalRequester: Send + Sync {
    async fn request(&self, prompt: String, options: Vec<String>, timeout: Duration, default: String) -> String;
}

/// The sinks installed into a session at creation time (spec §4.E items 1-2;
/// the transcript/artifact observers are wired by the manager itself, not
/// passed here).
pub struct SessionSinks {
    pub display: std::sync::Arc<dyn DisplaySink>,
    pub approval: std::sync::Arc<dyn ApprovalRequester>,
    pub events: mpsc::UnboundedSender<RuntimeEvent>,
}

/// Opaque result of resolving a bundle + behaviors into something a session
/// can be mounted from. Its shape is owned by the collaborator; we only pass
/// it back to `create_session` and surface a debug snapshot to clients.
#[derive(Clone, Debug)]
pub struct MountPlan {
    pub debug_info: Value,
    inner: Value,
}

impl MountPlan {
    #[must_use]
    pub fn new(debug_info: Value, inner: Value) -> Self {
        Self { debug_info, inner }
    }

    #[must_use]
    pub fn inner(&self) -> &Value {
        &self.inner
    }
}

/// A user turn submitted to an active session.
#[derive(Clone, Debug, Default)]
pub struct ExecuteRequest {
    pub content: String,
    pub images: Vec<String>,
    pub attachments: Vec<String>,
}

/// A live handle to a collaborator-owned session.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Run one turn to completion, driving the installed sinks as it goes.
    async fn execute(&self, request: ExecuteRequest) -> Result<()>;

    /// Cancel the current turn (cooperative) or interrupt immediately.
    fn cancel(&self, immediate: bool);
}

/// The external agent runtime, consumed through this boundary (spec §6.5).
#[async_trait]
pub trait RuntimeCollaborator: Send + Sync {
    async fn prepare(&self, bundle: &str, behaviors: &[String], provider_override: Option<Value>) -> Result<MountPlan>;

    async fn create_session(
        &self,
        mount_plan: MountPlan,
        sinks: SessionSinks,
        cwd: Option<String>,
        initial_transcript: Option<Vec<TranscriptEntry>>,
    ) -> Result<Box<dyn SessionHandle>>;
}

#[allow(unused)]
fn _assert_session_id_usable(_id: &SessionId) {}
