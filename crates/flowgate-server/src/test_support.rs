//! Shared helpers for the REST handler test modules.

use std::sync::Arc;

use flowgate_events::TranscriptStore;
use flowgate_runtime::collaborator::{ExecuteRequest, MountPlan, RuntimeCollaborator, SessionHandle, SessionSinks};

use crate::server::{AppState, GatewayServer};

struct StubHandle;

#[async_trait::async_trait]
impl SessionHandle for StubHandle {
    async fn execute(&self, _request: ExecuteRequest) -> flowgate_runtime::errors::Result<()> {
        Ok(())
    }
    fn cancel(&self, _immediate: bool) {}
}

struct StubCollaborator;

#[async_trait::async_trait]
impl RuntimeCollaborator for StubCollaborator {
    async fn prepare(&self, bundle: &str, _behaviors: &[String], _provider_override: Option<serde_json::Value>) -> flowgate_runtime::errors::Result<MountPlan> {
        Ok(MountPlan::new(serde_json::json!({"bundle": bundle}), serde_json::json!({})))
    }

    async fn create_session(
        &self,
        _mount_plan: MountPlan,
        _sinks: SessionSinks,
        _cwd: Option<String>,
        _initial_transcript: Option<Vec<flowgate_events::TranscriptEntry>>,
    ) -> flowgate_runtime::errors::Result<Box<dyn SessionHandle>> {
        Ok(Box::new(StubHandle))
    }
}

/// Build a fully wired `AppState` rooted at `state_root`, backed by a stub
/// collaborator that mounts and completes turns without doing anything.
pub(crate) fn test_app_state(state_root: std::path::PathBuf) -> AppState {
    let config = crate::config::ServerConfig { state_root: state_root.clone(), ..crate::config::ServerConfig::default() };
    let transcripts = Arc::new(TranscriptStore::new(state_root));
    let collaborator: Arc<dyn RuntimeCollaborator> = Arc::new(StubCollaborator);
    GatewayServer::new(config, collaborator, transcripts).state().clone()
}
