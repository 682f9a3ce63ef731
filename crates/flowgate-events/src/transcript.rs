//! Transcript entries: the unit of the append-only `transcript.jsonl` log.

use flowgate_core::{ContentBlock, Role};
use serde::{Deserialize, Serialize};

/// The `content` field of a transcript entry: either a plain string (simple
/// user turns) or an ordered list of blocks (assistant turns with streamed
/// text, thinking, and tool activity).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single line of a session's `transcript.jsonl`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub timestamp: String,
    pub content: EntryContent,
}

impl TranscriptEntry {
    /// Build an entry with the current timestamp.
    #[must_use]
    pub fn new(role: Role, content: EntryContent) -> Self {
        Self { role, timestamp: flowgate_core::time::now_rfc3339(), content }
    }

    /// Serialize as a single JSONL line (no trailing newline).
    ///
    /// # Errors
    /// Returns an error if the entry cannot be serialized to JSON.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_roundtrips() {
        let entry = TranscriptEntry::new(Role::User, EntryContent::Text("hello".into()));
        let line = entry.to_line().unwrap();
        let back: TranscriptEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back.role, Role::User);
        assert!(matches!(back.content, EntryContent::Text(s) if s == "hello"));
    }

    #[test]
    fn block_content_roundtrips() {
        let entry = TranscriptEntry::new(
            Role::Assistant,
            EntryContent::Blocks(vec![ContentBlock::Text { text: "Hi!".into() }]),
        );
        let line = entry.to_line().unwrap();
        let back: TranscriptEntry = serde_json::from_str(&line).unwrap();
        match back.content {
            EntryContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 1);
                assert_eq!(blocks[0].kind(), "text");
            }
            EntryContent::Text(_) => panic!("expected blocks"),
        }
    }

    #[test]
    fn to_line_has_no_trailing_newline() {
        let entry = TranscriptEntry::new(Role::System, EntryContent::Text("boot".into()));
        let line = entry.to_line().unwrap();
        assert!(!line.ends_with('\n'));
    }
}
