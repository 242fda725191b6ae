//! Error types for sessions, the analyst relay, and SQL execution.
//!
//! Connection failures are fatal for the whole interactive surface; analyst
//! and query failures are recoverable and scoped to one turn or one block.

use thiserror::Error;

use crate::session::SessionLeg;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting '{0}' (set it in the config file or environment)")]
    Missing(&'static str),
    #[error("unsupported authenticator '{0}' (expected snowflake, oauth, or programmatic_access_token)")]
    UnsupportedAuthenticator(String),
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure establishing one of the two Snowflake sessions.
#[derive(Debug, Clone, Error)]
#[error("failed to open {leg} session: {message}{}", code_suffix(.code))]
pub struct ConnectionError {
    pub leg: SessionLeg,
    pub message: String,
    pub code: Option<String>,
}

impl ConnectionError {
    pub fn new(leg: SessionLeg, message: impl Into<String>) -> Self {
        Self {
            leg,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystErrorKind {
    /// The request never produced an HTTP response.
    Transport,
    /// The service answered with status >= 400.
    Status,
    /// The body could not be decoded into content blocks.
    Malformed,
}

/// Failed or malformed Cortex Analyst call.
///
/// `request_id` is the server-issued `X-Snowflake-Request-Id` and must be
/// surfaced to the user whenever the server sent one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{}{}{}: {message}",
    kind_label(.kind),
    request_suffix(.request_id),
    status_suffix(.status_code)
)]
pub struct AnalystError {
    pub kind: AnalystErrorKind,
    pub request_id: Option<String>,
    pub status_code: Option<u16>,
    pub message: String,
}

impl AnalystError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: AnalystErrorKind::Transport,
            request_id: None,
            status_code: None,
            message: message.into(),
        }
    }

    pub fn status(status_code: u16, request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind: AnalystErrorKind::Status,
            request_id,
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub fn malformed(
        status_code: Option<u16>,
        request_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: AnalystErrorKind::Malformed,
            request_id,
            status_code,
            message: message.into(),
        }
    }
}

/// SQL returned by the analyst failed to run. Scoped to one content block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query failed{}{}: {message}", query_suffix(.query_id), code_suffix(.code))]
pub struct QueryExecutionError {
    pub message: String,
    pub code: Option<String>,
    pub query_id: Option<String>,
}

impl QueryExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            query_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("request id {0} is already recorded in this conversation")]
    DuplicateRequestId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("a question is already being answered")]
    Busy,
    #[error("question cannot be empty")]
    EmptyPrompt,
    #[error("no question is in flight")]
    NotSending,
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

fn kind_label(kind: &AnalystErrorKind) -> &'static str {
    match kind {
        AnalystErrorKind::Transport => "analyst request failed",
        AnalystErrorKind::Status => "analyst request rejected",
        AnalystErrorKind::Malformed => "analyst response malformed",
    }
}

fn request_suffix(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map(|id| format!(" (request id: {id})"))
        .unwrap_or_default()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

fn query_suffix(query_id: &Option<String>) -> String {
    query_id
        .as_deref()
        .map(|id| format!(" (query id: {id})"))
        .unwrap_or_default()
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" [code {c}]"))
        .unwrap_or_default()
}
