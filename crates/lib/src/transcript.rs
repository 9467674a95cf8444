//! Chat transcript: ordered entries with in-place placeholder replacement.
//!
//! The transcript is the client's rendering model. Front ends draw `entries()` top to bottom and
//! scroll to the bottom whenever `revision()` changes.

use crate::model::{HistoryMessage, Role};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Shown in place of an empty transcript.
pub const WELCOME_TEXT: &str = "Upload a document and ask me anything about it.";

/// Client-assigned entry id, unique within one transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// What an entry currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum EntryBody {
    /// Markdown text.
    Markdown(String),
    /// Waiting for the assistant's reply.
    Thinking,
    /// Inline error shown where content was expected.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub role: Role,
    pub body: EntryBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    pub at: DateTime<Local>,
}

impl Entry {
    pub fn is_thinking(&self) -> bool {
        matches!(self.body, EntryBody::Thinking)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    #[serde(skip)]
    revision: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Increases on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn push_body(&mut self, role: Role, body: EntryBody) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            role,
            body,
            sources: Vec::new(),
            at: Local::now(),
        });
        self.touch();
        id
    }

    /// Append a markdown message.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> EntryId {
        self.push_body(role, EntryBody::Markdown(content.into()))
    }

    /// Append an assistant thinking placeholder.
    pub fn push_thinking(&mut self) -> EntryId {
        self.push_body(Role::Assistant, EntryBody::Thinking)
    }

    /// Append an assistant error line.
    pub fn push_error(&mut self, text: impl Into<String>) -> EntryId {
        self.push_body(Role::Assistant, EntryBody::Error(text.into()))
    }

    /// Replace a placeholder with the final content. Returns false if the entry is gone.
    pub fn resolve(&mut self, id: EntryId, content: impl Into<String>, sources: Vec<String>) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.body = EntryBody::Markdown(content.into());
        entry.sources = sources;
        self.touch();
        true
    }

    /// Replace a placeholder with an inline error. Returns false if the entry is gone.
    pub fn fail(&mut self, id: EntryId, text: impl Into<String>) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.body = EntryBody::Error(text.into());
        entry.sources.clear();
        self.touch();
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.touch();
    }

    /// Discard everything and render a fetched history from scratch.
    pub fn replace_with_history(&mut self, history: &[HistoryMessage]) {
        self.entries.clear();
        for m in history {
            self.push(m.role, m.content.clone());
        }
        self.touch();
    }

    /// Drop thinking placeholders (they cannot settle after a reload).
    pub fn without_placeholders(&self) -> Transcript {
        Transcript {
            entries: self
                .entries
                .iter()
                .filter(|e| !e.is_thinking())
                .cloned()
                .collect(),
            next_id: self.next_id,
            revision: 0,
        }
    }
}
