//! UI-agnostic conversation types
//!
//! Shared between the TUI and the one-shot CLI commands; nothing here depends
//! on a UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One typed unit of an assistant response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Suggestions { suggestions: Vec<String> },
    #[serde(rename = "sql")]
    SqlStatement { statement: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn sql(statement: impl Into<String>) -> Self {
        ContentBlock::SqlStatement {
            statement: statement.into(),
        }
    }

    pub fn suggestions<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContentBlock::Suggestions {
            suggestions: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Wire tag used by the analyst service.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Suggestions { .. } => "suggestions",
            ContentBlock::SqlStatement { .. } => "sql",
        }
    }
}

/// The role of a conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A message in the conversation log. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: Vec<ContentBlock>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ConversationTurn {
    pub fn user(prompt: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: vec![ContentBlock::text(prompt)],
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    pub fn assistant(content: Vec<ContentBlock>, request_id: Option<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content,
            timestamp: Utc::now(),
            request_id,
        }
    }

    /// First text block, which for user turns is the prompt itself.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
