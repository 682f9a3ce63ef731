//! Per-connection WebSocket state machine: `NEW → AWAITING_AUTH → READY →
//! CLOSED`. A single task races inbound frames against the connection's
//! outbound queue so it can still emit a coded close frame on the way out.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use flowgate_core::{ApprovalId, SessionId};
use flowgate_runtime::manager::CreateConfig;
use flowgate_runtime::collaborator::ExecuteRequest;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::protocol::{self, ClientFrame};
use crate::server::AppState;
use crate::websocket::connection::ClientConnection;
use crate::websocket::registry::{RegistryApprovalSink, RegistryFrameSink};

/// Close code for "the first frame on this connection was not `auth`, or
/// the token did not match".
const CLOSE_AUTH_REQUIRED: u16 = 4001;
/// Close code for "client was idle past `read_idle_timeout_secs`".
const CLOSE_IDLE_TIMEOUT: u16 = 4002;
/// Close code for "outbound queue exceeded its hard cap".
const CLOSE_SLOW_CONSUMER: u16 = 4003;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnState {
    AwaitingAuth,
    Ready,
}

/// Drive one accepted WebSocket connection end to end: handshake, dispatch,
/// idle/backpressure enforcement, and teardown.
///
/// Reads and the outbound queue are raced with `tokio::select!` rather than
/// split across two tasks, so this function keeps `ws_tx` and can send an
/// explicit close frame with a protocol-specific code before tearing down.
pub async fn run_connection(socket: WebSocket, connection_id: String, _peer: IpAddr, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut outbound_rx) = tokio::sync::mpsc::channel(state.config.outbound_queue_capacity);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), tx));
    state.registry.add(connection.clone());

    let mut conn_state = ConnState::AwaitingAuth;
    let idle_timeout = Duration::from_secs(state.config.read_idle_timeout_secs);
    let mut close_code = None;

    'outer: loop {
        if connection.drop_count() as usize >= state.config.outbound_queue_hard_cap {
            warn!(connection_id, "closing slow consumer: outbound queue hard cap exceeded");
            close_code = Some(CLOSE_SLOW_CONSUMER);
            break;
        }

        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if ws_tx.send(Message::Text((*msg).as_str().into())).await.is_err() {
                            break 'outer;
                        }
                    }
                    None => break 'outer,
                }
            }
            inbound = tokio::time::timeout(idle_timeout, ws_rx.next()) => {
                let message = match inbound {
                    Ok(Some(Ok(message))) => message,
                    Ok(Some(Err(_)) | None) => break 'outer,
                    Err(_) => {
                        info!(connection_id, "closing idle connection");
                        close_code = Some(CLOSE_IDLE_TIMEOUT);
                        break 'outer;
                    }
                };

                match message {
                    Message::Text(text) => {
                        connection.mark_alive();
                        if !dispatch_text(&text, &mut conn_state, &connection, &state).await {
                            if conn_state == ConnState::AwaitingAuth {
                                close_code = Some(CLOSE_AUTH_REQUIRED);
                            }
                            break 'outer;
                        }
                    }
                    Message::Pong(_) => connection.mark_alive(),
                    Message::Close(_) => break 'outer,
                    Message::Binary(_) | Message::Ping(_) => {}
                }
            }
        }
    }

    if let Some(code) = close_code {
        let frame = CloseFrame { code, reason: close_reason(code).into() };
        let _ = ws_tx.send(Message::Close(Some(frame))).await;
    }

    teardown(&connection_id, &state).await;
}

fn close_reason(code: u16) -> &'static str {
    match code {
        CLOSE_AUTH_REQUIRED => "auth required",
        CLOSE_IDLE_TIMEOUT => "idle timeout",
        CLOSE_SLOW_CONSUMER => "slow consumer",
        _ => "closed",
    }
}

async fn teardown(connection_id: &str, state: &Arc<AppState>) {
    let orphaned = state.registry.remove(connection_id);
    for session_id in orphaned {
        let _ = state.session_manager.cancel(&session_id, true).await;
        state.approvals.end_session(&session_id);
        state.artifacts.end_session(&session_id);
    }
}

/// Handle one inbound text frame. Returns `false` if the connection should
/// close (auth rejected, or malformed handshake).
async fn dispatch_text(text: &str, conn_state: &mut ConnState, connection: &Arc<ClientConnection>, state: &Arc<AppState>) -> bool {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            if *conn_state == ConnState::AwaitingAuth {
                return false;
            }
            connection.send_json(&protocol::error_frame(format!("malformed frame: {err}")));
            return true;
        }
    };

    if *conn_state == ConnState::AwaitingAuth {
        return match frame {
            ClientFrame::Auth { token } => match state.auth.verify(&token) {
                Ok(true) => {
                    *conn_state = ConnState::Ready;
                    connection.send_json(&protocol::auth_success());
                    true
                }
                Ok(false) => false,
                Err(err) => {
                    warn!(%err, "auth store error during handshake");
                    false
                }
            },
            _ => false,
        };
    }

    match frame {
        ClientFrame::Auth { .. } => {
            connection.send_json(&protocol::error_frame("already authenticated"));
        }
        ClientFrame::Ping => connection.send_json(&protocol::pong()),
        ClientFrame::CreateSession { config } => handle_create_session(connection, state, config).await,
        ClientFrame::Prompt { session_id, content, images, attachments } => {
            handle_prompt(connection, state, session_id, content, images, attachments).await;
        }
        ClientFrame::ApprovalResponse { session_id, id, choice } => handle_approval_response(connection, state, session_id, id, choice),
        ClientFrame::Cancel { session_id, immediate } => handle_cancel(connection, state, session_id, immediate).await,
        ClientFrame::Command { session_id, name, args } => handle_command(connection, state, session_id, name, args),
    }
    true
}

fn resolve_session(connection: &ClientConnection, explicit: Option<SessionId>) -> Result<SessionId, String> {
    if let Some(id) = explicit {
        return if connection.owns_session(&id) { Ok(id) } else { Err(format!("connection does not own session {id}")) };
    }
    let owned = connection.owned_sessions();
    match owned.len() {
        1 => Ok(owned.into_iter().next().expect("len checked above")),
        0 => Err("no session on this connection; specify sessionId or create one first".to_owned()),
        _ => Err("connection owns multiple sessions; sessionId is required".to_owned()),
    }
}

async fn handle_create_session(connection: &Arc<ClientConnection>, state: &Arc<AppState>, config: protocol::CreateSessionConfig) {
    let frame_sink = Arc::new(RegistryFrameSink::new(state.registry.clone(), state.artifacts.clone()));
    let approval_sink = Arc::new(RegistryApprovalSink::new(state.registry.clone()));

    let outcome = if let Some(resume_id) = config.resume_session_id {
        state.session_manager.resume(resume_id, frame_sink, approval_sink).await
    } else {
        let prefs = state.preferences.get().unwrap_or_default();
        let create_config = CreateConfig {
            bundle: config.bundle.unwrap_or(prefs.default_bundle),
            behaviors: if config.behaviors.is_empty() { prefs.default_behaviors } else { config.behaviors },
            provider_override: config.provider,
            show_thinking: config.show_thinking,
            initial_transcript: config.initial_transcript,
            cwd: config.cwd.or(prefs.default_cwd),
            resume_session_id: None,
            parent_session_id: None,
        };
        state.session_manager.create(create_config, frame_sink, approval_sink).await
    };

    match outcome {
        Ok(outcome) => {
            connection.own_session(outcome.session_id.clone());
            state.registry.bind_session(&connection.id, outcome.session_id.clone());
            connection.send_json(&protocol::session_created(&outcome.session_id));
            connection.send_json(&protocol::session_start(&outcome.session_id, &outcome.bundle, outcome.parent_session_id.as_ref()));
            connection.send_json(&protocol::bundle_debug_info(&outcome.session_id, &outcome.debug_info));
        }
        Err(err) => connection.send_json(&protocol::error_frame(err.to_string())),
    }
}

async fn handle_prompt(
    connection: &Arc<ClientConnection>,
    state: &Arc<AppState>,
    session_id: Option<SessionId>,
    content: String,
    images: Vec<String>,
    attachments: Vec<String>,
) {
    let session_id = match resolve_session(connection, session_id) {
        Ok(id) => id,
        Err(message) => {
            connection.send_json(&protocol::error_frame(message));
            return;
        }
    };
    if let Err(err) = state.session_manager.prompt(&session_id, ExecuteRequest { content, images, attachments }).await {
        connection.send_json(&protocol::error_frame(err.to_string()));
    }
}

fn handle_approval_response(connection: &Arc<ClientConnection>, state: &Arc<AppState>, session_id: Option<SessionId>, id: ApprovalId, choice: String) {
    let session_id = match resolve_session(connection, session_id) {
        Ok(id) => id,
        Err(message) => {
            connection.send_json(&protocol::error_frame(message));
            return;
        }
    };
    if let Err(err) = state.approvals.respond(&session_id, &id, choice) {
        connection.send_json(&protocol::error_frame(err.to_string()));
    }
}

async fn handle_cancel(connection: &Arc<ClientConnection>, state: &Arc<AppState>, session_id: Option<SessionId>, immediate: bool) {
    let session_id = match resolve_session(connection, session_id) {
        Ok(id) => id,
        Err(message) => {
            connection.send_json(&protocol::error_frame(message));
            return;
        }
    };
    if let Err(err) = state.session_manager.cancel(&session_id, immediate).await {
        connection.send_json(&protocol::error_frame(err.to_string()));
    }
}

fn handle_command(connection: &Arc<ClientConnection>, state: &Arc<AppState>, session_id: Option<SessionId>, name: String, args: serde_json::Value) {
    let resolved = resolve_session(connection, session_id.clone());
    let result = match name.as_str() {
        "status" => serde_json::json!({
            "activeSessions": state.session_manager.active_count(),
            "connections": state.registry.connection_count(),
        }),
        "artifacts" => match &resolved {
            Ok(sid) => serde_json::json!(state.artifacts.list(sid)),
            Err(message) => serde_json::json!({ "error": message }),
        },
        other => {
            connection.send_json(&protocol::error_frame(format!("unknown command: {other}")));
            return;
        }
    };
    let _ = args;
    connection.send_json(&protocol::command_result(resolved.ok().as_ref(), &name, &result));
}
