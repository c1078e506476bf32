//! Append-only dialogue history owned by a single live session.

use crate::orchestrator::types::DialogueEntry;

/// Conversation order equals insertion order; entries are never removed or reordered.
#[derive(Debug, Clone, Default)]
pub struct DialogueHistory {
    entries: Vec<DialogueEntry>,
}

impl DialogueHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_caller<S: Into<String>>(&mut self, text: S) {
        self.entries.push(DialogueEntry::caller(text));
    }

    pub fn push_agent<S: Into<String>>(&mut self, text: S) {
        self.entries.push(DialogueEntry::agent(text));
    }

    pub fn snapshot(&self) -> Vec<DialogueEntry> {
        self.entries.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
