//! Session manager: the single place that owns the set of live sessions,
//! mounts bundles through the runtime collaborator, wires the streaming
//! adapter per session, and enforces the create/prompt/cancel/resume/list/
//! delete/rename lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowgate_approval::ApprovalBroker;
use flowgate_core::SessionId;
use flowgate_events::{EntryContent, SessionRecord, SessionStatus, TranscriptEntry, TranscriptStore};
use flowgate_streaming::{Frame, RuntimeEvent, StreamingAdapter};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::collaborator::{ExecuteRequest, RuntimeCollaborator, SessionSinks};
use crate::errors::{Result, RuntimeError};

/// How long `cancel` waits for a cooperatively-cancelled turn to drain
/// before marking the session idle regardless.
const CANCEL_DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Where completed frames go. Implemented by the WebSocket layer; kept
/// abstract here so the manager is testable without a live connection.
pub trait FrameSink: Send + Sync {
    fn send(&self, session_id: &SessionId, frame: Frame);
}

/// Inputs to create (or resume) a session.
#[derive(Clone, Debug, Default)]
pub struct CreateConfig {
    pub bundle: String,
    pub behaviors: Vec<String>,
    pub provider_override: Option<Value>,
    pub show_thinking: bool,
    pub initial_transcript: Option<Vec<TranscriptEntry>>,
    pub cwd: Option<String>,
    pub resume_session_id: Option<SessionId>,
    pub parent_session_id: Option<SessionId>,
}

/// What `create`/`resume` hand back to the caller so the WebSocket layer can
/// build its own `session_created`/`bundle_debug_info` frames.
#[derive(Debug)]
pub struct CreateOutcome {
    pub session_id: SessionId,
    pub debug_info: Value,
    pub bundle: String,
    pub parent_session_id: Option<SessionId>,
}

struct ManagedSession {
    children: Mutex<Vec<SessionId>>,
    handle: Box<dyn crate::collaborator::SessionHandle>,
    executing: AtomicBool,
}

/// Owns the live session set and drives it through the collaborator.
pub struct SessionManager {
    collaborator: Arc<dyn RuntimeCollaborator>,
    transcripts: Arc<TranscriptStore>,
    approvals: Arc<ApprovalBroker>,
    sessions: dashmap::DashMap<SessionId, Arc<ManagedSession>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(collaborator: Arc<dyn RuntimeCollaborator>, transcripts: Arc<TranscriptStore>, approvals: Arc<ApprovalBroker>) -> Self {
        Self { collaborator, transcripts, approvals, sessions: dashmap::DashMap::new() }
    }

    /// Mount a bundle, create the session directory, spawn the per-session
    /// event pump, and return the minted id.
    ///
    /// # Errors
    /// Returns an error if bundle resolution, transcript creation, or
    /// collaborator session creation fails.
    pub async fn create(
        self: &Arc<Self>,
        config: CreateConfig,
        outbound: Arc<dyn FrameSink>,
        approval_sink: Arc<dyn flowgate_approval::ApprovalSink>,
    ) -> Result<CreateOutcome> {
        let mount_plan = self
            .collaborator
            .prepare(&config.bundle, &config.behaviors, config.provider_override.clone())
            .await
            .map_err(|e| match e {
                RuntimeError::BundleResolution { .. } => e,
                other => RuntimeError::BundleResolution { bundle: config.bundle.clone(), message: other.to_string() },
            })?;
        let debug_info = mount_plan.debug_info.clone();

        let session_id = config.resume_session_id.clone().unwrap_or_default();
        self.transcripts.open(&session_id, &config.bundle, config.behaviors.clone(), config.cwd.clone())?;
        if let Some(parent) = &config.parent_session_id {
            self.transcripts.snapshot_metadata(&session_id, |rec| rec.parent_session_id = Some(parent.clone()))?;
        }
        if let Some(entries) = &config.initial_transcript {
            for entry in entries {
                self.transcripts.append(&session_id, entry)?;
            }
        }

        let (tx, rx) = mpsc::unbounded_channel::<RuntimeEvent>();
        let sinks = SessionSinks {
            display: Arc::new(crate::collaborator::TracingDisplaySink),
            approval: Arc::new(BrokerApprovalRequester { broker: self.approvals.clone(), sink: approval_sink, session_id: session_id.clone() }),
            events: tx,
        };

        let handle = self
            .collaborator
            .create_session(mount_plan, sinks, config.cwd.clone(), config.initial_transcript.clone())
            .await?;

        let managed = Arc::new(ManagedSession {
            children: Mutex::new(Vec::new()),
            handle,
            executing: AtomicBool::new(false),
        });
        self.sessions.insert(session_id.clone(), managed);

        if let Some(parent) = &config.parent_session_id {
            if let Some(parent_managed) = self.sessions.get(parent) {
                parent_managed.children.lock().push(session_id.clone());
            }
        }

        self.spawn_pump(session_id.clone(), rx, outbound);

        Ok(CreateOutcome { session_id, debug_info, bundle: config.bundle, parent_session_id: config.parent_session_id })
    }

    /// Re-mount a session from its persisted transcript, keeping the same id.
    ///
    /// # Errors
    /// Returns an error if the transcript cannot be loaded or the session
    /// cannot be recreated.
    pub async fn resume(
        self: &Arc<Self>,
        session_id: SessionId,
        outbound: Arc<dyn FrameSink>,
        approval_sink: Arc<dyn flowgate_approval::ApprovalSink>,
    ) -> Result<CreateOutcome> {
        let record = self.record(&session_id)?;
        if self.sessions.contains_key(&session_id) {
            return Err(RuntimeError::SessionActive(session_id));
        }
        let transcript = self.transcripts.load_transcript(&session_id)?;
        let config = CreateConfig {
            bundle: record.bundle,
            behaviors: record.behaviors,
            provider_override: None,
            show_thinking: false,
            initial_transcript: Some(transcript),
            cwd: record.cwd,
            resume_session_id: Some(session_id),
            parent_session_id: record.parent_session_id,
        };
        self.create(config, outbound, approval_sink).await
    }

    /// Submit a user turn. Rejects if a turn is already executing.
    ///
    /// # Errors
    /// Returns [`RuntimeError::SessionNotFound`] if the session is not
    /// active, [`RuntimeError::SessionBusy`] if a turn is already running,
    /// or a transcript/collaborator error from executing the turn.
    pub async fn prompt(&self, session_id: &SessionId, request: ExecuteRequest) -> Result<()> {
        let managed = self.active(session_id)?;
        if managed.executing.swap(true, Ordering::SeqCst) {
            managed.executing.store(true, Ordering::SeqCst);
            return Err(RuntimeError::SessionBusy(session_id.clone()));
        }

        self.transcripts.append(session_id, &TranscriptEntry::new(flowgate_core::Role::User, EntryContent::Text(request.content.clone())))?;

        let result = managed.handle.execute(request).await;
        managed.executing.store(false, Ordering::SeqCst);
        self.transcripts.snapshot_metadata(session_id, |rec| rec.turn_count += 1)?;
        result
    }

    /// Cancel a session's current turn, cascading depth-first to every
    /// descendant and firing their pending approvals with their defaults.
    /// Awaits drain up to a bounded deadline, then marks each affected
    /// session `idle` and unmounts it.
    ///
    /// # Errors
    /// Returns [`RuntimeError::SessionNotFound`] if the session is not
    /// active.
    pub async fn cancel(&self, session_id: &SessionId, immediate: bool) -> Result<()> {
        let managed = self.active(session_id)?;
        let mut subtree = Vec::new();
        self.collect_subtree(&managed, session_id, &mut subtree);

        for (id, member) in &subtree {
            member.handle.cancel(immediate);
            self.approvals.cancel_session(id, "Deny");
        }

        for (id, member) in subtree {
            self.await_drain(&member).await;
            let _ = self.transcripts.snapshot_metadata(&id, |rec| rec.status = SessionStatus::Idle);
            self.sessions.remove(&id);
        }

        Ok(())
    }

    /// Depth-first collection of a session and its descendants (children
    /// before parent), so cancellation and drain can be applied bottom-up.
    fn collect_subtree(&self, managed: &Arc<ManagedSession>, session_id: &SessionId, acc: &mut Vec<(SessionId, Arc<ManagedSession>)>) {
        let children: Vec<SessionId> = managed.children.lock().clone();
        for child_id in &children {
            if let Some(child) = self.sessions.get(child_id) {
                let child = child.clone();
                self.collect_subtree(&child, child_id, acc);
            }
        }
        acc.push((session_id.clone(), managed.clone()));
    }

    /// Poll `executing` until it clears or the drain deadline passes.
    async fn await_drain(&self, managed: &Arc<ManagedSession>) {
        let deadline = tokio::time::Instant::now() + CANCEL_DRAIN_DEADLINE;
        while managed.executing.load(Ordering::SeqCst) {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// List every known session (active or idle), most recently updated
    /// first.
    ///
    /// # Errors
    /// Returns an error if the transcript store cannot be enumerated.
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.transcripts.list()?)
    }

    /// Delete a session's persisted transcript. Refuses an active session.
    ///
    /// # Errors
    /// Returns [`RuntimeError::SessionActive`] if the session is live,
    /// otherwise propagates a transcript store error.
    pub fn delete(&self, session_id: &SessionId) -> Result<()> {
        if self.sessions.contains_key(session_id) {
            return Err(RuntimeError::SessionActive(session_id.clone()));
        }
        Ok(self.transcripts.delete(session_id)?)
    }

    /// Rename a session's human-readable label. Refuses an active session.
    ///
    /// # Errors
    /// Returns [`RuntimeError::SessionActive`] if the session is live,
    /// otherwise propagates a transcript store error.
    pub fn rename(&self, session_id: &SessionId, name: &str) -> Result<SessionRecord> {
        if self.sessions.contains_key(session_id) {
            return Err(RuntimeError::SessionActive(session_id.clone()));
        }
        Ok(self.transcripts.rename(session_id, name)?)
    }

    /// Number of sessions currently mounted and active, for health
    /// reporting.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// IDs of every currently active (mounted) session.
    #[must_use]
    pub fn active_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    fn active(&self, session_id: &SessionId) -> Result<Arc<ManagedSession>> {
        self.sessions.get(session_id).map(|e| e.clone()).ok_or_else(|| RuntimeError::SessionNotFound(session_id.clone()))
    }

    fn record(&self, session_id: &SessionId) -> Result<SessionRecord> {
        self.transcripts
            .list()?
            .into_iter()
            .find(|r| &r.session_id == session_id)
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.clone()))
    }

    fn spawn_pump(self: &Arc<Self>, session_id: SessionId, mut rx: mpsc::UnboundedReceiver<RuntimeEvent>, outbound: Arc<dyn FrameSink>) {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut adapter = StreamingAdapter::new(session_id.clone());
            while let Some(event) = rx.recv().await {
                if let RuntimeEvent::SessionFork { child_session_id, .. } = &event {
                    manager.register_fork(&session_id, child_session_id.clone());
                }
                for frame in adapter.handle(event) {
                    outbound.send(&session_id, frame);
                }
            }
        });
    }

    fn register_fork(&self, parent: &SessionId, child: SessionId) {
        if let Some(parent_managed) = self.sessions.get(parent) {
            parent_managed.children.lock().push(child);
        }
    }
}

struct BrokerApprovalRequester {
    broker: Arc<ApprovalBroker>,
    sink: Arc<dyn flowgate_approval::ApprovalSink>,
    session_id: SessionId,
}

#[async_trait::async_trait]
impl crate::collaborator::ApprovalRequester for BrokerApprovalRequester {
    async fn request(&self, prompt: String, options: Vec<String>, timeout: std::time::Duration, default: String) -> String {
        self.broker.request(self.sink.as_ref(), &self.session_id, &prompt, options, timeout, &default).await.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{MountPlan, SessionHandle};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct RecordingSink {
        frames: Mutex<Vec<(SessionId, Frame)>>,
    }

    impl Default for RecordingSink {
        fn default() -> Self {
            Self { frames: Mutex::new(Vec::new()) }
        }
    }

    impl FrameSink for RecordingSink {
        fn send(&self, session_id: &SessionId, frame: Frame) {
            self.frames.lock().push((session_id.clone(), frame));
        }
    }

    #[derive(Default)]
    struct NoopApprovalSink;

    impl flowgate_approval::ApprovalSink for NoopApprovalSink {
        fn emit_approval_request(
            &self,
            _session_id: &SessionId,
            _id: &flowgate_core::ApprovalId,
            _prompt: &str,
            _options: &[String],
            _timeout_secs: u64,
            _default: &str,
        ) {
        }
    }

    struct MockHandle {
        cancelled: Arc<AtomicBool>,
        events: mpsc::UnboundedSender<RuntimeEvent>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SessionHandle for MockHandle {
        async fn execute(&self, _request: ExecuteRequest) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RuntimeError::RuntimeFault { session_id: SessionId::new(), message: "boom".into() });
            }
            let _ = self.events.send(RuntimeEvent::PromptComplete { turn: 1 });
            Ok(())
        }

        fn cancel(&self, _immediate: bool) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    struct MockCollaborator {
        fail_prepare: bool,
        fail_execute: bool,
        cancel_flags: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl MockCollaborator {
        fn new(fail_prepare: bool, fail_execute: bool) -> Self {
            Self { fail_prepare, fail_execute, cancel_flags: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl RuntimeCollaborator for MockCollaborator {
        async fn prepare(&self, bundle: &str, _behaviors: &[String], _provider_override: Option<Value>) -> Result<MountPlan> {
            if self.fail_prepare {
                return Err(RuntimeError::BundleResolution { bundle: bundle.to_owned(), message: "no such bundle".into() });
            }
            Ok(MountPlan::new(serde_json::json!({"bundle": bundle}), serde_json::json!({})))
        }

        async fn create_session(
            &self,
            _mount_plan: MountPlan,
            sinks: SessionSinks,
            _cwd: Option<String>,
            _initial_transcript: Option<Vec<TranscriptEntry>>,
        ) -> Result<Box<dyn SessionHandle>> {
            let cancelled = Arc::new(AtomicBool::new(false));
            self.cancel_flags.lock().push(cancelled.clone());
            Ok(Box::new(MockHandle { cancelled, events: sinks.events, calls: AtomicUsize::new(0), fail: self.fail_execute }))
        }
    }

    fn manager(fail_prepare: bool, fail_execute: bool) -> (Arc<SessionManager>, Arc<MockCollaborator>) {
        let collaborator = Arc::new(MockCollaborator::new(fail_prepare, fail_execute));
        let dyn_collaborator: Arc<dyn RuntimeCollaborator> = collaborator.clone();
        let dir = tempfile::tempdir().unwrap();
        let transcripts = Arc::new(TranscriptStore::new(dir.path().to_path_buf()));
        std::mem::forget(dir);
        let approvals = Arc::new(ApprovalBroker::new());
        (Arc::new(SessionManager::new(dyn_collaborator, transcripts, approvals)), collaborator)
    }

    fn sink() -> Arc<dyn FrameSink> {
        Arc::new(RecordingSink::default())
    }

    fn approval_sink() -> Arc<dyn flowgate_approval::ApprovalSink> {
        Arc::new(NoopApprovalSink)
    }

    #[tokio::test]
    async fn create_mounts_and_registers_session() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();
        assert!(manager.sessions.contains_key(&outcome.session_id));
    }

    #[tokio::test]
    async fn create_surfaces_bundle_resolution_failure() {
        let (manager, _) = manager(true, false);
        let err = manager
            .create(CreateConfig { bundle: "missing".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::BundleResolution { .. }));
    }

    #[tokio::test]
    async fn prompt_rejects_second_concurrent_call() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();

        let managed = manager.sessions.get(&outcome.session_id).unwrap().clone();
        managed.executing.store(true, Ordering::SeqCst);

        let err = manager.prompt(&outcome.session_id, ExecuteRequest { content: "hi".into(), ..Default::default() }).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionBusy(_)));
    }

    #[tokio::test]
    async fn prompt_on_unknown_session_errors() {
        let (manager, _) = manager(false, false);
        let err = manager.prompt(&SessionId::new(), ExecuteRequest::default()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn prompt_runs_turn_and_appends_transcript() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();

        manager.prompt(&outcome.session_id, ExecuteRequest { content: "hello".into(), ..Default::default() }).await.unwrap();

        let transcript = manager.transcripts.load_transcript(&outcome.session_id).unwrap();
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn cancel_cascades_to_children() {
        let (manager, collaborator) = manager(false, false);
        let parent = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();
        manager
            .create(
                CreateConfig { bundle: "foundation".into(), parent_session_id: Some(parent.session_id.clone()), ..Default::default() },
                sink(),
                approval_sink(),
            )
            .await
            .unwrap();

        manager.cancel(&parent.session_id, true).await.unwrap();

        let flags = collaborator.cancel_flags.lock();
        assert_eq!(flags.len(), 2);
        assert!(flags.iter().all(|f| f.load(Ordering::SeqCst)));
    }

    #[tokio::test]
    async fn delete_refuses_active_session() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();
        let err = manager.delete(&outcome.session_id).unwrap_err();
        assert!(matches!(err, RuntimeError::SessionActive(_)));
    }

    #[tokio::test]
    async fn rename_refuses_active_session() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();
        let err = manager.rename(&outcome.session_id, "new name").unwrap_err();
        assert!(matches!(err, RuntimeError::SessionActive(_)));
    }

    #[tokio::test]
    async fn cancel_marks_session_idle_and_unmounts_it() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();

        manager.cancel(&outcome.session_id, true).await.unwrap();

        assert!(!manager.sessions.contains_key(&outcome.session_id));
        let record = manager.transcripts.list().unwrap().into_iter().find(|r| r.session_id == outcome.session_id).unwrap();
        assert_eq!(record.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn delete_succeeds_after_cancel() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();

        manager.cancel(&outcome.session_id, true).await.unwrap();
        manager.delete(&outcome.session_id).unwrap();

        assert!(manager.transcripts.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_succeeds_after_cancel() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();

        manager.cancel(&outcome.session_id, true).await.unwrap();
        let record = manager.rename(&outcome.session_id, "new name").unwrap();

        assert_eq!(record.name.as_deref(), Some("new name"));
    }

    #[tokio::test]
    async fn resume_remounts_session_with_same_id_and_transcript() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();
        manager.prompt(&outcome.session_id, ExecuteRequest { content: "hello".into(), ..Default::default() }).await.unwrap();

        // Simulate a process restart: the in-memory session table is gone
        // but the transcript and metadata persist on disk.
        manager.sessions.remove(&outcome.session_id);

        let resumed = manager.resume(outcome.session_id.clone(), sink(), approval_sink()).await.unwrap();
        assert_eq!(resumed.session_id, outcome.session_id);
        assert_eq!(resumed.bundle, "foundation");
        assert!(manager.sessions.contains_key(&outcome.session_id));

        let transcript = manager.transcripts.load_transcript(&outcome.session_id).unwrap();
        assert!(!transcript.is_empty());
    }

    #[tokio::test]
    async fn resume_refuses_already_active_session() {
        let (manager, _) = manager(false, false);
        let outcome = manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();

        let err = manager.resume(outcome.session_id, sink(), approval_sink()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionActive(_)));
    }

    #[tokio::test]
    async fn resume_unknown_session_errors() {
        let (manager, _) = manager(false, false);
        let err = manager.resume(SessionId::new(), sink(), approval_sink()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn list_surfaces_created_sessions() {
        let (manager, _) = manager(false, false);
        manager
            .create(CreateConfig { bundle: "foundation".into(), ..Default::default() }, sink(), approval_sink())
            .await
            .unwrap();
        assert_eq!(manager.list().unwrap().len(), 1);
    }
}
