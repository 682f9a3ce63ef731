//! Placeholder [`RuntimeCollaborator`] — the actual agent runtime is an
//! external process this gateway fronts, not something this repository
//! implements (see the runtime collaborator contract). This stands in the
//! slot a real deployment fills with a trait object that talks to that
//! runtime; until one is wired in, bundle resolution fails cleanly instead
//! of leaving the binary unable to start.

use async_trait::async_trait;
use flowgate_events::TranscriptEntry;
use flowgate_runtime::collaborator::{MountPlan, RuntimeCollaborator, SessionHandle, SessionSinks};
use flowgate_runtime::errors::{Result, RuntimeError};
use serde_json::Value;

/// Fails every `prepare` call with [`RuntimeError::BundleResolution`] since
/// no agent runtime is attached. Swap this out for a real
/// [`RuntimeCollaborator`] implementation that talks to the actual runtime
/// process.
#[derive(Default)]
pub struct ExternalRuntimeCollaborator;

impl ExternalRuntimeCollaborator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuntimeCollaborator for ExternalRuntimeCollaborator {
    async fn prepare(&self, bundle: &str, _behaviors: &[String], _provider_override: Option<Value>) -> Result<MountPlan> {
        Err(RuntimeError::BundleResolution { bundle: bundle.to_owned(), message: "no agent runtime collaborator is attached to this gateway".into() })
    }

    async fn create_session(
        &self,
        _mount_plan: MountPlan,
        _sinks: SessionSinks,
        _cwd: Option<String>,
        _initial_transcript: Option<Vec<TranscriptEntry>>,
    ) -> Result<Box<dyn SessionHandle>> {
        unreachable!("prepare always fails, so create_session is never reached")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepare_fails_cleanly() {
        let collaborator = ExternalRuntimeCollaborator::new();
        let result = collaborator.prepare("foundation", &[], None).await;
        assert!(matches!(result, Err(RuntimeError::BundleResolution { .. })));
    }
}
