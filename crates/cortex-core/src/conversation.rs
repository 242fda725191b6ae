//! Append-only conversation log.

use chrono::Local;

use crate::error::ConversationError;
use crate::state::{ChatRole, ContentBlock, ConversationTurn};

/// Sidebar shows this many recent turns.
pub const HISTORY_WINDOW: usize = 10;
const HISTORY_PREVIEW_CHARS: usize = 50;

/// One line of the sidebar history summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub preview: String,
    pub time: String,
}

#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    turns: Vec<ConversationTurn>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, prompt: &str) -> &ConversationTurn {
        self.turns.push(ConversationTurn::user(prompt));
        &self.turns[self.turns.len() - 1]
    }

    /// Append an assistant turn. Request ids must stay unique in the log.
    pub fn push_assistant(
        &mut self,
        content: Vec<ContentBlock>,
        request_id: Option<String>,
    ) -> Result<&ConversationTurn, ConversationError> {
        if let Some(id) = request_id.as_deref() {
            if self.find_by_request_id(id).is_some() {
                return Err(ConversationError::DuplicateRequestId(id.to_string()));
            }
        }
        self.turns.push(ConversationTurn::assistant(content, request_id));
        Ok(&self.turns[self.turns.len() - 1])
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&ConversationTurn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn find_by_request_id(&self, request_id: &str) -> Option<(usize, &ConversationTurn)> {
        self.turns
            .iter()
            .enumerate()
            .find(|(_, t)| t.request_id.as_deref() == Some(request_id))
    }

    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == ChatRole::User).count()
    }

    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// User prompts among the last [`HISTORY_WINDOW`] turns, oldest first.
    pub fn history_summary(&self) -> Vec<HistoryEntry> {
        self.recent(HISTORY_WINDOW)
            .iter()
            .filter(|t| t.role == ChatRole::User)
            .map(|t| HistoryEntry {
                preview: preview(t.first_text().unwrap_or_default()),
                time: t.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string(),
            })
            .collect()
    }

    /// Start over. Drops every turn at once; individual turns are never edited.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= HISTORY_PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(HISTORY_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}
