//! Per-session streaming adapter.
//!
//! Owned and driven exclusively by the task running that session (see the
//! concurrency model: per-session state has a single writer, so no internal
//! locking is needed here — callers are expected to hold `&mut` for the
//! adapter's lifetime).

use std::collections::{HashMap, VecDeque};

use flowgate_core::SessionId;

use crate::events::{BlockType, Nesting, RuntimeEvent};
use crate::frames::Frame;

#[derive(Default)]
struct Scope {
    block_index_map: HashMap<u32, u32>,
    next_local_index: u32,
    order_counter: u64,
    open_thinking: Option<(u32, u64)>,
}

impl Scope {
    fn alloc_block(&mut self, server_index: u32) -> (u32, u64) {
        let local = self.next_local_index;
        self.next_local_index += 1;
        let order = self.order_counter;
        self.order_counter += 1;
        self.block_index_map.insert(server_index, local);
        (local, order)
    }

    fn alloc_order(&mut self) -> u64 {
        let order = self.order_counter;
        self.order_counter += 1;
        order
    }

    /// First thinking delta/final for the turn allocates a local index; later
    /// ones reuse it. Returns `(index, order_if_newly_allocated)`.
    fn ensure_thinking(&mut self) -> (u32, Option<u64>) {
        if let Some((index, _)) = self.open_thinking {
            (index, None)
        } else {
            let index = self.next_local_index;
            self.next_local_index += 1;
            let order = self.order_counter;
            self.order_counter += 1;
            self.open_thinking = Some((index, order));
            (index, Some(order))
        }
    }

    fn clear_tool_round(&mut self) {
        self.block_index_map.clear();
    }

    fn reset_turn(&mut self) {
        self.block_index_map.clear();
        self.next_local_index = 0;
        self.open_thinking = None;
    }
}

/// Default tool-name signals treated as sub-session delegation.
fn is_delegation_tool(name: &str) -> bool {
    name == "task" || name.eq_ignore_ascii_case("delegate")
}

/// Translates one session's runtime events into client frames, maintaining
/// the block-index and chronological-order bookkeeping described for the
/// main timeline and every live child (sub-session) timeline.
pub struct StreamingAdapter {
    #[allow(dead_code)]
    session_id: SessionId,
    main: Scope,
    /// Sub-adapter state keyed by the owning parent tool-call id.
    children: HashMap<String, Scope>,
    /// child session id -> owning parent tool-call id.
    child_to_parent: HashMap<SessionId, String>,
    /// tool-call id -> child session id, for teardown on `tool_result`.
    tool_child: HashMap<String, SessionId>,
    /// Delegation tool calls seen with no `session_fork` yet.
    unbound_calls: VecDeque<String>,
    /// `session_fork` events seen with no originating tool call yet.
    unbound_forks: VecDeque<SessionId>,
}

impl StreamingAdapter {
    /// Create a fresh adapter for a new session.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            main: Scope::default(),
            children: HashMap::new(),
            child_to_parent: HashMap::new(),
            tool_child: HashMap::new(),
            unbound_calls: VecDeque::new(),
            unbound_forks: VecDeque::new(),
        }
    }

    fn scope_for(&mut self, nesting: &Nesting) -> &mut Scope {
        let key = nesting.parent_tool_call_id.clone().or_else(|| {
            nesting.child_session_id.as_ref().and_then(|sid| self.child_to_parent.get(sid).cloned())
        });
        match key {
            Some(k) => self.children.entry(k).or_default(),
            None => &mut self.main,
        }
    }

    /// Process one runtime event, returning the client frames it produces
    /// (zero, one, or two — `session_fork` produces none itself).
    pub fn handle(&mut self, event: RuntimeEvent) -> Vec<Frame> {
        match event {
            RuntimeEvent::ContentStart { server_index, block_type, nesting } => {
                vec![self.content_start(server_index, block_type, nesting)]
            }
            RuntimeEvent::ContentDelta { server_index, delta, nesting } => {
                self.content_delta(server_index, delta, nesting).into_iter().collect()
            }
            RuntimeEvent::ContentEnd { server_index, content, nesting } => {
                self.content_end(server_index, content, nesting).into_iter().collect()
            }
            RuntimeEvent::ThinkingDelta { delta, nesting } => vec![self.thinking_delta(delta, nesting)],
            RuntimeEvent::ThinkingFinal { thinking, signature, nesting } => {
                vec![self.thinking_final(thinking, signature, nesting)]
            }
            RuntimeEvent::ToolCall { id, name, arguments, nesting } => {
                vec![self.tool_call(id, name, arguments, nesting)]
            }
            RuntimeEvent::ToolResult { id, success, result, nesting } => {
                vec![self.tool_result(id, success, result, nesting)]
            }
            RuntimeEvent::SessionFork { child_session_id, parent_tool_call_id } => {
                let bound = self.session_fork(child_session_id.clone(), parent_tool_call_id);
                vec![Frame::SessionFork { child_session_id, parent_tool_call_id: bound }]
            }
            RuntimeEvent::PromptComplete { turn } => vec![self.prompt_complete(turn)],
        }
    }

    fn content_start(&mut self, server_index: u32, block_type: BlockType, nesting: Nesting) -> Frame {
        let child_session_id = nesting.child_session_id.clone();
        let parent_tool_call_id = nesting.parent_tool_call_id.clone();
        let nesting_depth = nesting.nesting_depth;
        let (index, order) = self.scope_for(&nesting).alloc_block(server_index);
        Frame::ContentStart { index, order, block_type, child_session_id, parent_tool_call_id, nesting_depth }
    }

    fn content_delta(&mut self, server_index: u32, delta: String, nesting: Nesting) -> Option<Frame> {
        let child_session_id = nesting.child_session_id.clone();
        let scope = self.scope_for(&nesting);
        let index = *scope.block_index_map.get(&server_index)?;
        Some(Frame::ContentDelta { index, delta, child_session_id })
    }

    fn content_end(&mut self, server_index: u32, content: String, nesting: Nesting) -> Option<Frame> {
        let child_session_id = nesting.child_session_id.clone();
        let scope = self.scope_for(&nesting);
        let index = *scope.block_index_map.get(&server_index)?;
        Some(Frame::ContentEnd { index, content, child_session_id })
    }

    fn thinking_delta(&mut self, delta: String, nesting: Nesting) -> Frame {
        let child_session_id = nesting.child_session_id.clone();
        let (index, order) = self.scope_for(&nesting).ensure_thinking();
        Frame::ThinkingDelta { index, order, delta, child_session_id }
    }

    fn thinking_final(&mut self, thinking: String, signature: Option<String>, nesting: Nesting) -> Frame {
        let child_session_id = nesting.child_session_id.clone();
        let (index, _) = self.scope_for(&nesting).ensure_thinking();
        self.scope_for(&nesting).open_thinking = None;
        Frame::ThinkingFinal { index, thinking, signature, child_session_id }
    }

    fn tool_call(&mut self, id: String, name: String, arguments: serde_json::Value, nesting: Nesting) -> Frame {
        let child_session_id = nesting.child_session_id.clone();
        let order = self.scope_for(&nesting).alloc_order();

        if is_delegation_tool(&name) {
            if let Some(child_sid) = self.unbound_forks.pop_front() {
                self.bind(id.clone(), child_sid);
            } else {
                self.unbound_calls.push_back(id.clone());
            }
        }

        Frame::ToolCall { id, name, arguments, order, status: "pending", child_session_id }
    }

    /// Bind `session_fork` to either the given `parent_tool_call_id`, or (if
    /// `None`) the oldest unbound delegation call — or queue the fork to wait
    /// for a tool call that hasn't arrived yet. Returns the tool-call id the
    /// fork was actually bound to, or `None` if it is still queued.
    fn session_fork(&mut self, child_session_id: SessionId, parent_tool_call_id: Option<String>) -> Option<String> {
        let bound_id = match parent_tool_call_id {
            Some(id) => {
                self.unbound_calls.retain(|c| c != &id);
                id
            }
            None => match self.unbound_calls.pop_front() {
                Some(id) => id,
                None => {
                    self.unbound_forks.push_back(child_session_id);
                    return None;
                }
            },
        };
        self.bind(bound_id.clone(), child_session_id);
        Some(bound_id)
    }

    fn bind(&mut self, parent_tool_call_id: String, child_session_id: SessionId) {
        self.children.insert(parent_tool_call_id.clone(), Scope::default());
        self.child_to_parent.insert(child_session_id.clone(), parent_tool_call_id.clone());
        self.tool_child.insert(parent_tool_call_id, child_session_id);
    }

    fn tool_result(&mut self, id: String, success: bool, result: serde_json::Value, nesting: Nesting) -> Frame {
        let child_session_id = nesting.child_session_id.clone();
        self.scope_for(&nesting).clear_tool_round();

        if let Some(child_sid) = self.tool_child.remove(&id) {
            let _ = self.children.remove(&id);
            let _ = self.child_to_parent.remove(&child_sid);
        } else {
            self.unbound_calls.retain(|c| c != &id);
        }

        Frame::ToolResult { id, success, result, child_session_id }
    }

    fn prompt_complete(&mut self, turn: u64) -> Frame {
        self.main.reset_turn();
        for scope in self.children.values_mut() {
            scope.reset_turn();
        }
        Frame::PromptComplete { turn }
    }

    /// Whether a child session currently has live sub-adapter state.
    #[must_use]
    pub fn has_child(&self, child_session_id: &SessionId) -> bool {
        self.child_to_parent.contains_key(child_session_id)
    }

    /// Number of tool calls awaiting a `session_fork` binding.
    #[must_use]
    pub fn unbound_call_count(&self) -> usize {
        self.unbound_calls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> Nesting {
        Nesting::root()
    }

    #[test]
    fn happy_path_text_block_gets_sequential_index_and_order() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let start = adapter.content_start(0, BlockType::Text, root());
        assert!(matches!(start, Frame::ContentStart { index: 0, order: 0, .. }));

        let delta = adapter.content_delta(0, "hi".into(), root()).unwrap();
        assert_eq!(delta, Frame::ContentDelta { index: 0, delta: "hi".into(), child_session_id: None });

        let end = adapter.content_end(0, "hi".into(), root()).unwrap();
        assert_eq!(end, Frame::ContentEnd { index: 0, content: "hi".into(), child_session_id: None });
    }

    #[test]
    fn delta_for_unknown_server_index_is_dropped() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        assert!(adapter.content_delta(7, "x".into(), root()).is_none());
    }

    #[test]
    fn tool_call_consumes_order_without_local_index() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.content_start(0, BlockType::Text, root());
        let frame = adapter.tool_call("T1".into(), "write_file".into(), json!({}), root());
        match frame {
            Frame::ToolCall { order, status, .. } => {
                assert_eq!(order, 1);
                assert_eq!(status, "pending");
            }
            _ => panic!("expected tool call frame"),
        }
    }

    #[test]
    fn tool_result_clears_block_map_but_keeps_indices_monotone() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.content_start(0, BlockType::Text, root());
        let _ = adapter.content_end(0, "hi".into(), root());
        let _ = adapter.tool_call("T1".into(), "write_file".into(), json!({}), root());
        let _ = adapter.tool_result("T1".into(), true, json!({}), root());

        // server_index 0 reused by the next response, but local_index must
        // be strictly greater than any previously assigned.
        let next_start = adapter.content_start(0, BlockType::Text, root());
        match next_start {
            Frame::ContentStart { index, .. } => assert!(index > 0),
            _ => panic!(),
        }
    }

    #[test]
    fn prompt_complete_resets_local_index_but_not_order() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.content_start(0, BlockType::Text, root());
        let _ = adapter.content_end(0, "hi".into(), root());
        let _ = adapter.prompt_complete(1);

        let start = adapter.content_start(0, BlockType::Text, root());
        match start {
            Frame::ContentStart { index, order, .. } => {
                assert_eq!(index, 0, "local index resets for the new turn");
                assert!(order > 0, "order stays monotone across turns");
            }
            _ => panic!(),
        }
    }

    #[test]
    fn thinking_delta_implicitly_opens_block_once() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let first = adapter.thinking_delta("Let me ".into(), root());
        let second = adapter.thinking_delta("think".into(), root());
        let (i1, o1) = match first {
            Frame::ThinkingDelta { index, order, .. } => (index, order),
            _ => panic!(),
        };
        let (i2, o2) = match second {
            Frame::ThinkingDelta { index, order, .. } => (index, order),
            _ => panic!(),
        };
        assert_eq!(i1, i2, "same block across deltas");
        assert!(o1.is_some(), "order allocated on first delta");
        assert!(o2.is_none(), "order omitted on subsequent delta");
    }

    #[test]
    fn session_fork_binds_fifo_when_tool_call_precedes_fork() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.tool_call("Ta".into(), "task".into(), json!({}), root());
        let _ = adapter.tool_call("Tb".into(), "task".into(), json!({}), root());
        assert_eq!(adapter.unbound_call_count(), 2);

        let child_a = SessionId::new();
        let child_b = SessionId::new();
        adapter.session_fork(child_a.clone(), None);
        adapter.session_fork(child_b.clone(), None);

        assert_eq!(adapter.child_to_parent.get(&child_a), Some(&"Ta".to_string()));
        assert_eq!(adapter.child_to_parent.get(&child_b), Some(&"Tb".to_string()));
        assert_eq!(adapter.unbound_call_count(), 0);
    }

    #[test]
    fn session_fork_binds_when_fork_precedes_tool_call() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let child = SessionId::new();
        adapter.session_fork(child.clone(), None);
        assert_eq!(adapter.unbound_forks.len(), 1);

        let _ = adapter.tool_call("Ta".into(), "task".into(), json!({}), root());
        assert!(adapter.has_child(&child));
        assert_eq!(adapter.child_to_parent.get(&child), Some(&"Ta".to_string()));
    }

    #[test]
    fn explicit_parent_tool_call_id_binds_directly() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.tool_call("Ta".into(), "task".into(), json!({}), root());
        let child = SessionId::new();
        adapter.session_fork(child.clone(), Some("Ta".into()));
        assert!(adapter.has_child(&child));
        assert_eq!(adapter.unbound_call_count(), 0);
    }

    #[test]
    fn child_events_route_to_sub_adapter_scope() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.tool_call("Ta".into(), "task".into(), json!({}), root());
        let child = SessionId::new();
        adapter.session_fork(child.clone(), Some("Ta".into()));

        let nesting = Nesting { child_session_id: Some(child.clone()), parent_tool_call_id: None, nesting_depth: 1 };
        let start = adapter.content_start(0, BlockType::Text, nesting.clone());
        match start {
            Frame::ContentStart { index, order, child_session_id, .. } => {
                assert_eq!(index, 0);
                assert_eq!(order, 0, "child scope has its own order counter");
                assert_eq!(child_session_id, Some(child));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn tool_result_tears_down_child_scope() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.tool_call("Ta".into(), "task".into(), json!({}), root());
        let child = SessionId::new();
        adapter.session_fork(child.clone(), Some("Ta".into()));
        assert!(adapter.has_child(&child));

        let _ = adapter.tool_result("Ta".into(), true, json!({}), root());
        assert!(!adapter.has_child(&child));
    }

    #[test]
    fn parallel_sub_sessions_get_independent_scopes() {
        let mut adapter = StreamingAdapter::new(SessionId::new());
        let _ = adapter.tool_call("Ta".into(), "task".into(), json!({}), root());
        let _ = adapter.tool_call("Tb".into(), "task".into(), json!({}), root());
        let child_a = SessionId::new();
        let child_b = SessionId::new();
        adapter.session_fork(child_a.clone(), None);
        adapter.session_fork(child_b.clone(), None);

        let nesting_a = Nesting { child_session_id: Some(child_a), parent_tool_call_id: None, nesting_depth: 1 };
        let nesting_b = Nesting { child_session_id: Some(child_b), parent_tool_call_id: None, nesting_depth: 1 };

        let _ = adapter.content_start(0, BlockType::Text, nesting_a.clone());
        let _ = adapter.content_start(0, BlockType::Text, nesting_b.clone());
        // Both scopes independently assigned local_index 0 for server_index 0.
        let delta_a = adapter.content_delta(0, "a".into(), nesting_a).unwrap();
        let delta_b = adapter.content_delta(0, "b".into(), nesting_b).unwrap();
        match (delta_a, delta_b) {
            (
                Frame::ContentDelta { index: ia, delta: da, .. },
                Frame::ContentDelta { index: ib, delta: db, .. },
            ) => {
                assert_eq!(ia, 0);
                assert_eq!(ib, 0);
                assert_eq!(da, "a");
                assert_eq!(db, "b");
            }
            _ => panic!(),
        }
    }
}
