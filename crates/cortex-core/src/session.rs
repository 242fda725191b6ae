//! Authenticated Snowflake sessions.
//!
//! A [`Session`] wraps the session token returned by the login endpoint. The
//! same token authorizes SQL execution (`/queries/v1/query-request`) and the
//! Cortex Analyst REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::auth::Credentials;
use crate::error::ConnectionError;

pub const LOGIN_PATH: &str = "/session/v1/login-request";
const CLIENT_APP_ID: &str = "cortex-chat";

/// Which of the two long-lived sessions a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionLeg {
    Query,
    Analyst,
}

impl fmt::Display for SessionLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionLeg::Query => write!(f, "query"),
            SessionLeg::Analyst => write!(f, "analyst"),
        }
    }
}

/// Role, warehouse, and namespace a session is opened against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub role: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
}

/// Result of `SELECT CURRENT_USER(), CURRENT_ROLE()` right after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub role: String,
}

pub struct Session {
    leg: SessionLeg,
    base_url: String,
    token: String,
    http: Client,
    target: SessionTarget,
    identity: Option<Identity>,
    sequence: AtomicU64,
}

impl Session {
    pub fn new(leg: SessionLeg, base_url: &str, token: &str, target: SessionTarget) -> Self {
        Self::with_client(Client::new(), leg, base_url, token, target)
    }

    pub fn with_client(
        http: Client,
        leg: SessionLeg,
        base_url: &str,
        token: &str,
        target: SessionTarget,
    ) -> Self {
        Self {
            leg,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
            target,
            identity: None,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn leg(&self) -> SessionLeg {
        self.leg
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// `Authorization` header value for both SQL and analyst calls.
    pub fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("leg", &self.leg)
            .field("base_url", &self.base_url)
            .field("target", &self.target)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Opens sessions. The connection manager only talks to this seam.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn open(&self, leg: SessionLeg, target: &SessionTarget) -> Result<Session, ConnectionError>;
}

/// Common envelope of Snowflake's internal REST responses.
#[derive(Deserialize, Debug)]
pub(crate) struct SnowflakeEnvelope<T> {
    pub data: Option<T>,
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: String,
    login_name: &'a str,
    authenticator: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    session_parameters: serde_json::Value,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LoginResponseData {
    token: Option<String>,
}

/// Logs in with the `/session/v1/login-request` endpoint.
pub struct SnowflakeAuthenticator {
    http: Client,
    base_url: String,
    account: String,
    user: String,
    credentials: Credentials,
}

impl SnowflakeAuthenticator {
    pub fn new(base_url: &str, account: &str, user: &str, credentials: Credentials) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            account: account.to_string(),
            user: user.to_string(),
            credentials,
        }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self, crate::error::ConfigError> {
        Ok(Self::new(
            &config.base_url()?,
            config.account()?,
            config.user()?,
            config.credentials()?,
        ))
    }

    /// Account locator part of the identifier (`org-acct.eu-west-1` → `ORG-ACCT`).
    fn account_name(&self) -> String {
        self.account
            .split('.')
            .next()
            .unwrap_or(&self.account)
            .to_uppercase()
    }

    async fn login(&self, leg: SessionLeg, target: &SessionTarget) -> Result<String, ConnectionError> {
        let (password, token) = match &self.credentials {
            Credentials::Password(p) => (Some(p.as_str()), None),
            Credentials::OAuth(t) | Credentials::ProgrammaticAccessToken(t) => (None, Some(t.as_str())),
        };

        let request = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: self.account_name(),
                login_name: &self.user,
                authenticator: self.credentials.method().login_authenticator(),
                password,
                token,
                session_parameters: serde_json::json!({ "CLIENT_SESSION_KEEP_ALIVE": true }),
            },
        };

        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(%leg, %url, database = %target.database, schema = %target.schema, "Sending login request");

        let response = self
            .http
            .post(&url)
            .query(&[
                ("request_id", request_id.as_str()),
                ("databaseName", target.database.as_str()),
                ("schemaName", target.schema.as_str()),
                ("warehouse", target.warehouse.as_str()),
                ("roleName", target.role.as_str()),
            ])
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ConnectionError::new(leg, format!("login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConnectionError::new(
                leg,
                format!("login rejected with status {}: {}", status, text),
            ));
        }

        let envelope: SnowflakeEnvelope<LoginResponseData> = response
            .json()
            .await
            .map_err(|e| ConnectionError::new(leg, format!("unreadable login response: {}", e)))?;

        if !envelope.success {
            return Err(ConnectionError::new(
                leg,
                envelope.message.unwrap_or_else(|| "login failed".to_string()),
            )
            .with_code(envelope.code));
        }

        envelope
            .data
            .and_then(|d| d.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectionError::new(leg, "login response did not include a session token"))
    }
}

#[async_trait]
impl Authenticator for SnowflakeAuthenticator {
    async fn open(&self, leg: SessionLeg, target: &SessionTarget) -> Result<Session, ConnectionError> {
        let token = self.login(leg, target).await?;
        let mut session =
            Session::with_client(self.http.clone(), leg, &self.base_url, &token, target.clone());

        if leg == SessionLeg::Query {
            let identity = crate::query::current_identity(&session)
                .await
                .map_err(|e| ConnectionError::new(leg, format!("connection test failed: {}", e)))?;
            info!(user = %identity.user, role = %identity.role, "Query session connected");
            session.set_identity(identity);
        } else {
            info!(%leg, database = %target.database, schema = %target.schema, "Session connected");
        }

        Ok(session)
    }
}
