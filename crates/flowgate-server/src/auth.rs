//! Bearer token handshake: `<state_root>/web-auth.json`.
//!
//! The token gates both the WebSocket handshake (first `auth` frame) and
//! every REST route except `/api/health` and `/api/auth/local-token`. A
//! fresh token is minted on first use and persisted; `/api/auth/local-token`
//! hands it back only to callers connecting from loopback, so a user on the
//! same machine can bootstrap a client without copying the token by hand.

use std::fs::{self, File, OpenOptions};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ServerError;

#[derive(Serialize, Deserialize)]
struct AuthDocument {
    token: String,
}

/// File-backed store for the server's single bearer token.
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    /// Root the store at `<state_root>/web-auth.json`.
    #[must_use]
    pub fn open(state_root: impl AsRef<Path>) -> Self {
        Self { path: state_root.as_ref().join("web-auth.json") }
    }

    /// Load the persisted token, minting and persisting a fresh one if this
    /// is the first run.
    pub fn token(&self) -> Result<String, ServerError> {
        if let Some(doc) = self.read()? {
            return Ok(doc.token);
        }
        let token = generate_token();
        self.write(&token)?;
        Ok(token)
    }

    /// Compare a candidate bearer token against the stored one.
    pub fn verify(&self, candidate: &str) -> Result<bool, ServerError> {
        Ok(self.token()? == candidate)
    }

    fn read(&self) -> Result<Option<AuthDocument>, ServerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        FileExt::lock_shared(&file)?;
        let content = fs::read_to_string(&self.path)?;
        FileExt::unlock(&file)?;
        Ok(Some(serde_json::from_str(&content).map_err(|e| ServerError::BadRequest(e.to_string()))?))
    }

    fn write(&self, token: &str) -> Result<(), ServerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        FileExt::lock_exclusive(&file)?;
        serde_json::to_writer_pretty(&file, &AuthDocument { token: token.to_owned() })
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        file.sync_all()?;
        FileExt::unlock(&file)?;
        debug!(path = %self.path.display(), "minted new bearer token");
        Ok(())
    }
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether `addr` is a loopback address (127.0.0.1 or ::1).
#[must_use]
pub fn is_loopback(addr: IpAddr) -> bool {
    addr.is_loopback()
}
