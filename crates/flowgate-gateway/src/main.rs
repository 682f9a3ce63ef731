//! # flowgate-gateway
//!
//! Gateway server binary — wires the persisted stores and session manager
//! together behind a WebSocket/REST server and starts listening.

#![deny(unsafe_code)]

mod collaborator;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use flowgate_events::TranscriptStore;
use flowgate_runtime::collaborator::RuntimeCollaborator;
use flowgate_server::config::ServerConfig;
use flowgate_server::server::GatewayServer;

/// Session-streaming gateway server.
#[derive(Parser, Debug)]
#[command(name = "flowgate-gateway", about = "Session-streaming gateway server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1", env = "FLOWGATE_HOST")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value_t = 0, env = "FLOWGATE_PORT")]
    port: u16,

    /// Directory holding `web-auth.json`, `web-preferences.json`, and
    /// `web-sessions/`.
    #[arg(long, env = "FLOWGATE_STATE_ROOT")]
    state_root: Option<PathBuf>,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Cli {
    fn default_state_root() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".flowgate").join("state")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    flowgate_core::logging::init();

    let args = Cli::parse();
    let state_root = args.state_root.unwrap_or_else(Cli::default_state_root);
    std::fs::create_dir_all(&state_root).with_context(|| format!("failed to create state root: {}", state_root.display()))?;

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        max_connections: args.max_connections.unwrap_or(ServerConfig::default().max_connections),
        state_root: state_root.clone(),
        ..ServerConfig::default()
    };

    let transcripts = Arc::new(TranscriptStore::new(state_root));
    let collaborator: Arc<dyn RuntimeCollaborator> = Arc::new(collaborator::ExternalRuntimeCollaborator::new());

    let server = GatewayServer::new(config, collaborator, transcripts);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!(%addr, "flowgate-gateway listening");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    server.shutdown().shutdown();
    let _ = handle.await;
    tracing::info!("shutdown complete");

    Ok(())
}
