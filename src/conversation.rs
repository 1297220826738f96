//! Per-sender conversation state.
//!
//! Transcripts are append-only and unbounded in storage; only the read
//! window handed to the responder is capped. All mutation happens on the
//! relay task, so no locking is needed here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// In-memory map from sender identity to transcript.
///
/// Conversations are created lazily on first append and live for the
/// process lifetime.
#[derive(Debug, Default)]
pub struct ConversationStore {
    transcripts: HashMap<String, Vec<ConversationTurn>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to a sender's transcript, creating it if needed.
    pub fn append_turn(&mut self, sender: &str, turn: ConversationTurn) {
        self.transcripts
            .entry(sender.to_string())
            .or_default()
            .push(turn);
    }

    /// The most recent `limit` turns for `sender`, oldest first.
    ///
    /// Returns fewer turns when the history is shorter, and an empty slice
    /// for a sender that has never been seen. Earlier turns stay in
    /// storage; they are only excluded from the view.
    pub fn window(&self, sender: &str, limit: usize) -> &[ConversationTurn] {
        let Some(turns) = self.transcripts.get(sender) else {
            return &[];
        };
        let start = turns.len().saturating_sub(limit);
        &turns[start..]
    }

    /// Total turns stored for `sender`, window cap notwithstanding.
    pub fn len(&self, sender: &str) -> usize {
        self.transcripts.get(sender).map_or(0, Vec::len)
    }
}
