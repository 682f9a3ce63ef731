//! File-backed transcript store.
//!
//! Each session owns a directory `<state_root>/web-sessions/<id>/` holding
//! `metadata.json` and an append-only `transcript.jsonl`. The store is
//! per-process exclusive: every read-modify-write of `metadata.json` and
//! every append to `transcript.jsonl` takes an OS-level advisory lock on the
//! file being touched, which is sufficient given the single-user model.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use flowgate_core::SessionId;
use tracing::warn;

use crate::errors::{Result, TranscriptError};
use crate::metadata::SessionRecord;
use crate::transcript::TranscriptEntry;

/// Append-only transcript store rooted at `<state_root>/web-sessions`.
#[derive(Clone, Debug)]
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    /// Open a store rooted under `state_root` (created lazily per session).
    #[must_use]
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self { root: state_root.into().join("web-sessions") }
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }

    fn metadata_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("metadata.json")
    }

    fn transcript_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join("transcript.jsonl")
    }

    /// Open (creating on first use) the session directory and metadata.
    ///
    /// # Errors
    /// Returns an error if the directory or metadata file cannot be created
    /// or read.
    pub fn open(
        &self,
        session_id: &SessionId,
        bundle: &str,
        behaviors: Vec<String>,
        cwd: Option<String>,
    ) -> Result<SessionRecord> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)?;
        let meta_path = self.metadata_path(session_id);

        if meta_path.exists() {
            return self.read_metadata(&meta_path);
        }

        let record = SessionRecord::new(session_id.clone(), bundle.to_owned(), behaviors, cwd);
        self.write_metadata(&meta_path, &record)?;
        Ok(record)
    }

    /// Append one transcript entry, fsync'd before returning.
    ///
    /// # Errors
    /// Returns an error if the session has never been opened, or if the
    /// write fails.
    pub fn append(&self, session_id: &SessionId, entry: &TranscriptEntry) -> Result<()> {
        let dir = self.session_dir(session_id);
        if !dir.exists() {
            return Err(TranscriptError::NotFound(session_id.clone()));
        }

        let path = self.transcript_path(session_id);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        FileExt::lock_exclusive(&file)?;
        let write_result = (|| -> Result<()> {
            let line = entry.to_line()?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            Ok(())
        })();
        let _ = FileExt::unlock(&file);
        write_result
    }

    /// Apply `mutate` to the session's metadata and persist the result,
    /// bumping `updated_at`.
    ///
    /// # Errors
    /// Returns an error if the session has never been opened, or the
    /// metadata file cannot be read or written.
    pub fn snapshot_metadata(
        &self,
        session_id: &SessionId,
        mutate: impl FnOnce(&mut SessionRecord),
    ) -> Result<SessionRecord> {
        let meta_path = self.metadata_path(session_id);
        if !meta_path.exists() {
            return Err(TranscriptError::NotFound(session_id.clone()));
        }
        let mut record = self.read_metadata(&meta_path)?;
        mutate(&mut record);
        record.updated_at = flowgate_core::time::now_rfc3339();
        self.write_metadata(&meta_path, &record)?;
        Ok(record)
    }

    /// Load the full ordered transcript for a session.
    ///
    /// A trailing line with no newline terminator (a partial write left by a
    /// crash mid-append) is silently discarded rather than erroring. Fully
    /// written lines that fail to parse are logged and skipped so a single
    /// corrupt entry does not make the whole transcript unreadable.
    ///
    /// # Errors
    /// Returns an error if the session has never been opened or the file
    /// cannot be read.
    pub fn load_transcript(&self, session_id: &SessionId) -> Result<Vec<TranscriptEntry>> {
        let path = self.transcript_path(session_id);
        if !path.exists() {
            if self.session_dir(session_id).exists() {
                return Ok(Vec::new());
            }
            return Err(TranscriptError::NotFound(session_id.clone()));
        }

        let raw = fs::read_to_string(&path)?;
        let ends_with_newline = raw.ends_with('\n');
        let mut lines: Vec<&str> = raw.lines().collect();
        if !ends_with_newline && lines.pop().is_some() {
            warn!(%session_id, "discarding partial trailing transcript line");
        }

        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TranscriptEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(%session_id, %err, "skipping unparsable transcript line"),
            }
        }
        Ok(entries)
    }

    /// List metadata for every known session, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if the store root cannot be enumerated.
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let meta_path = entry.path().join("metadata.json");
            if !meta_path.exists() {
                continue;
            }
            match self.read_metadata(&meta_path) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %meta_path.display(), %err, "skipping unreadable session metadata"),
            }
        }
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    /// Delete a session's directory entirely. Refuses to delete an active
    /// session.
    ///
    /// # Errors
    /// Returns an error if the session is active or not found, or deletion
    /// fails.
    pub fn delete(&self, session_id: &SessionId) -> Result<()> {
        let record = self.read_metadata(&self.metadata_path(session_id))?;
        if !record.status.is_mutable() {
            return Err(TranscriptError::StillActive(session_id.clone()));
        }
        fs::remove_dir_all(self.session_dir(session_id))?;
        Ok(())
    }

    /// Rename a session's human-readable label. Refuses to rename an active
    /// session.
    ///
    /// # Errors
    /// Returns an error if the session is active or not found, or the write
    /// fails.
    pub fn rename(&self, session_id: &SessionId, name: &str) -> Result<SessionRecord> {
        let record = self.read_metadata(&self.metadata_path(session_id))?;
        if !record.status.is_mutable() {
            return Err(TranscriptError::StillActive(session_id.clone()));
        }
        self.snapshot_metadata(session_id, |rec| rec.name = Some(name.to_owned()))
    }

    fn read_metadata(&self, path: &Path) -> Result<SessionRecord> {
        let file = File::open(path)?;
        FileExt::lock_shared(&file)?;
        let result = serde_json::from_reader(BufReader::new(&file)).map_err(TranscriptError::from);
        let _ = FileExt::unlock(&file);
        result
    }

    fn write_metadata(&self, path: &Path, record: &SessionRecord) -> Result<()> {
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        FileExt::lock_exclusive(&file)?;
        let result = (|| -> Result<()> {
            serde_json::to_writer_pretty(&file, record)?;
            file.sync_all()?;
            Ok(())
        })();
        let _ = FileExt::unlock(&file);
        result
    }
}
