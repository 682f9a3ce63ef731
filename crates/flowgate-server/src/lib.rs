//! # flowgate-server
//!
//! Axum HTTP + `WebSocket` multiplexer fronting the session manager.
//!
//! - HTTP endpoints: health check, bearer auth verification, bundle/behavior
//!   registry CRUD, session history, preferences, document extraction
//! - `WebSocket` gateway: connection management, idle/backpressure enforcement,
//!   frame dispatch
//! - Graceful shutdown via `CancellationToken` coordination

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod protocol;
pub mod rest;
pub mod server;
pub mod shutdown;
#[cfg(test)]
pub(crate) mod test_support;
pub mod websocket;
