//! Cortex Analyst REST client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AnalystError;
use crate::session::Session;
use crate::state::ContentBlock;

pub const ANALYST_MESSAGE_PATH: &str = "/api/v2/cortex/analyst/message";
pub const REQUEST_ID_HEADER: &str = "X-Snowflake-Request-Id";

/// Prompt used by the connection check.
pub const GREETING_PROMPT: &str = "Hello, can you help me understand my utilization data?";

#[derive(Serialize)]
struct AnalystRequest<'a> {
    messages: Vec<RequestMessage>,
    semantic_model_file: &'a str,
}

#[derive(Serialize)]
struct RequestMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct AnalystResponseBody {
    message: ResponseMessage,
    #[serde(default)]
    warnings: Vec<Warning>,
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Deserialize)]
struct Warning {
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    request_id: Option<String>,
}

/// Decoded analyst answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalystResponse {
    pub content: Vec<ContentBlock>,
    pub request_id: Option<String>,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait Analyst: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<AnalystResponse, AnalystError>;
}

#[derive(Clone)]
pub struct AnalystClient {
    client: Client,
    session: Arc<Session>,
    semantic_model_file: String,
}

impl AnalystClient {
    pub fn new(session: Arc<Session>, semantic_model_file: &str) -> Self {
        Self {
            client: Client::new(),
            session,
            semantic_model_file: semantic_model_file.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.session.base_url(), ANALYST_MESSAGE_PATH)
    }

    pub fn semantic_model_file(&self) -> &str {
        &self.semantic_model_file
    }
}

#[async_trait]
impl Analyst for AnalystClient {
    async fn ask(&self, prompt: &str) -> Result<AnalystResponse, AnalystError> {
        let request = AnalystRequest {
            messages: vec![RequestMessage {
                role: "user",
                content: vec![ContentBlock::text(prompt)],
            }],
            semantic_model_file: &self.semantic_model_file,
        };

        let url = self.endpoint();
        debug!(%url, model = %self.semantic_model_file, "Sending analyst message");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.session.authorization())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalystError::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let header_request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.text().await.map_err(|e| {
            let mut err = AnalystError::transport(format!("failed to read response body: {}", e));
            err.request_id = header_request_id.clone();
            err.status_code = Some(status);
            err
        })?;

        if status >= 400 {
            let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
            let request_id = header_request_id
                .or_else(|| parsed.as_ref().and_then(|b| b.request_id.clone()));
            let message = parsed
                .and_then(|b| b.message)
                .unwrap_or(body);
            let err = AnalystError::status(status, request_id, message);
            warn!(error = %err, "Analyst request failed");
            return Err(err);
        }

        parse_response(&body, status, header_request_id)
    }
}

/// Decode a successful body. The header request id wins over the body's.
pub fn parse_response(
    body: &str,
    status: u16,
    header_request_id: Option<String>,
) -> Result<AnalystResponse, AnalystError> {
    let parsed: AnalystResponseBody = serde_json::from_str(body).map_err(|e| {
        AnalystError::malformed(Some(status), header_request_id.clone(), e.to_string())
    })?;

    let request_id = header_request_id.or(parsed.request_id);
    let mut content = Vec::with_capacity(parsed.message.content.len());

    for (index, raw) in parsed.message.content.into_iter().enumerate() {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_default();
        match kind.as_str() {
            "text" | "suggestions" | "sql" => {
                let block: ContentBlock = serde_json::from_value(raw).map_err(|e| {
                    AnalystError::malformed(
                        Some(status),
                        request_id.clone(),
                        format!("content block {} ({}) is invalid: {}", index, kind, e),
                    )
                })?;
                content.push(block);
            }
            other => {
                warn!(index, kind = %other, request_id = ?request_id, "Skipping unsupported content block");
            }
        }
    }

    let warnings: Vec<String> = parsed.warnings.into_iter().map(|w| w.message).collect();
    for warning in &warnings {
        warn!(request_id = ?request_id, %warning, "Analyst warning");
    }

    Ok(AnalystResponse {
        content,
        request_id,
        warnings,
    })
}
