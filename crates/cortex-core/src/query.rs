//! SQL execution against a Snowflake session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::QueryExecutionError;
use crate::session::{Identity, Session, SnowflakeEnvelope};

pub const QUERY_PATH: &str = "/queries/v1/query-request";

// Codes Snowflake returns while a statement is still running.
const QUERY_IN_PROGRESS: &str = "333333";
const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

/// Opaque tabular result: column metadata plus stringly-typed cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
    pub query_id: Option<String>,
}

impl QueryResult {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns,
            rows,
            query_id: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    pub fn numeric(&self, row: usize, col: usize) -> Option<f64> {
        self.cell(row, col)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<QueryResult, QueryExecutionError>;
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    query_submission_time: i64,
}

#[derive(Deserialize, Debug)]
struct RowType {
    name: String,
    #[serde(rename = "type", default)]
    data_type: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Chunk {
    url: String,
    #[serde(default)]
    row_count: usize,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct QueryResponseData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
    query_id: Option<String>,
    query_result_format: Option<String>,
    get_result_url: Option<String>,
    #[serde(default)]
    chunks: Vec<Chunk>,
    #[serde(default)]
    chunk_headers: HashMap<String, String>,
    qrmk: Option<String>,
}

fn cell(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn rows_from(rowset: Vec<Vec<Value>>) -> Vec<Vec<Option<String>>> {
    rowset
        .into_iter()
        .map(|row| row.into_iter().map(cell).collect())
        .collect()
}

impl Session {
    async fn send_query(&self, statement: &str) -> Result<SnowflakeEnvelope<QueryResponseData>, QueryExecutionError> {
        let url = format!("{}{}", self.base_url(), QUERY_PATH);
        let request = QueryRequest {
            sql_text: statement,
            async_exec: false,
            sequence_id: self.next_sequence(),
            query_submission_time: chrono::Utc::now().timestamp_millis(),
        };

        let response = self
            .http()
            .post(&url)
            .query(&[("requestId", uuid::Uuid::new_v4().to_string())])
            .header("Authorization", self.authorization())
            .header("Accept", "application/snowflake")
            .json(&request)
            .send()
            .await
            .map_err(|e| QueryExecutionError::new(format!("query request failed: {}", e)))?;

        Self::decode(response).await
    }

    async fn poll_result(&self, path: &str) -> Result<SnowflakeEnvelope<QueryResponseData>, QueryExecutionError> {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url(), path)
        };

        let response = self
            .http()
            .get(&url)
            .header("Authorization", self.authorization())
            .header("Accept", "application/snowflake")
            .send()
            .await
            .map_err(|e| QueryExecutionError::new(format!("result poll failed: {}", e)))?;

        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<SnowflakeEnvelope<QueryResponseData>, QueryExecutionError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QueryExecutionError::new(format!(
                "query endpoint returned status {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| QueryExecutionError::new(format!("unreadable query response: {}", e)))
    }

    async fn fetch_chunks(&self, data: &QueryResponseData) -> Result<Vec<Vec<Value>>, QueryExecutionError> {
        let mut headers = data.chunk_headers.clone();
        if headers.is_empty() {
            if let Some(qrmk) = &data.qrmk {
                headers.insert("x-amz-server-side-encryption-customer-key".to_string(), qrmk.clone());
                headers.insert(
                    "x-amz-server-side-encryption-customer-algorithm".to_string(),
                    "AES256".to_string(),
                );
            }
        }

        let mut rows = Vec::new();
        for (index, chunk) in data.chunks.iter().enumerate() {
            debug!(index, expected_rows = chunk.row_count, "Downloading result chunk");
            let mut request = self.http().get(&chunk.url);
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request
                .send()
                .await
                .map_err(|e| QueryExecutionError::new(format!("result chunk {} failed: {}", index, e)))?;
            if !response.status().is_success() {
                return Err(QueryExecutionError::new(format!(
                    "result chunk {} returned status {}",
                    index,
                    response.status()
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| QueryExecutionError::new(format!("result chunk {} unreadable: {}", index, e)))?;
            // Chunks are a comma separated list of row arrays without the outer brackets.
            let parsed: Vec<Vec<Value>> = serde_json::from_str(&format!("[{}]", body.trim()))
                .map_err(|e| QueryExecutionError::new(format!("result chunk {} malformed: {}", index, e)))?;
            rows.extend(parsed);
        }
        Ok(rows)
    }
}

#[async_trait]
impl SqlExecutor for Session {
    async fn execute(&self, statement: &str) -> Result<QueryResult, QueryExecutionError> {
        debug!(leg = %self.leg(), "Executing statement");
        let mut envelope = self.send_query(statement).await?;

        while matches!(
            envelope.code.as_deref(),
            Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
        ) {
            let path = envelope
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| QueryExecutionError::new("query still running but no result url was given"))?;
            tokio::time::sleep(POLL_INTERVAL).await;
            envelope = self.poll_result(&path).await?;
        }

        let data = envelope.data.unwrap_or_default();
        if !envelope.success {
            let err = QueryExecutionError {
                message: envelope.message.unwrap_or_else(|| "query failed".to_string()),
                code: envelope.code,
                query_id: data.query_id,
            };
            warn!(error = %err, "Statement failed");
            return Err(err);
        }

        if let Some(format) = data.query_result_format.as_deref() {
            if !format.eq_ignore_ascii_case("json") {
                return Err(QueryExecutionError {
                    message: format!("unsupported result format '{}'", format),
                    code: None,
                    query_id: data.query_id,
                });
            }
        }

        let extra = self.fetch_chunks(&data).await?;
        let mut rowset = data.rowset;
        rowset.extend(extra);

        Ok(QueryResult {
            columns: data
                .rowtype
                .into_iter()
                .map(|c| Column {
                    name: c.name,
                    data_type: c.data_type,
                })
                .collect(),
            rows: rows_from(rowset),
            query_id: data.query_id,
        })
    }
}

/// Connection test run right after the query session logs in.
pub(crate) async fn current_identity(session: &Session) -> Result<Identity, QueryExecutionError> {
    let result = session
        .execute("SELECT CURRENT_USER(), CURRENT_ROLE()")
        .await?;
    match (result.cell(0, 0), result.cell(0, 1)) {
        (Some(user), Some(role)) => Ok(Identity {
            user: user.to_string(),
            role: role.to_string(),
        }),
        _ => Err(QueryExecutionError::new("identity query returned no rows")),
    }
}
