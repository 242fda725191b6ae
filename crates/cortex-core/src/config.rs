use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::{AuthMethod, Credentials};
use crate::error::ConfigError;
use crate::session::{SessionLeg, SessionTarget};

/// Where the semantic model consumed by Cortex Analyst lives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CortexConfig {
    pub database: String,
    pub schema: String,
    pub stage: String,
    pub semantic_model: String,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            database: "MERU_PREPARED".to_string(),
            schema: "UTILIZATION_DASHBOARD".to_string(),
            stage: "RAG_YAML".to_string(),
            semantic_model: "utilization_agent.yaml".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub account: Option<String>,
    pub user: Option<String>,
    pub role: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub authenticator: String,
    /// Overrides `<account>.snowflakecomputing.com`, e.g. for private link.
    pub host: Option<String>,
    pub cortex: CortexConfig,
    /// Which session runs the SQL returned by the analyst.
    pub sql_session: SessionLeg,
    pub export_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            account: None,
            user: None,
            role: "MERU_DEVELOPER".to_string(),
            warehouse: "CORTEX_WH".to_string(),
            database: "MERU_PREPARED".to_string(),
            schema: "UTILIZATION_DASHBOARD".to_string(),
            authenticator: AuthMethod::Password.as_str().to_string(),
            host: None,
            cortex: CortexConfig::default(),
            sql_session: SessionLeg::Query,
            export_dir: None,
            password: None,
            token: None,
        }
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Self::new()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut on_disk = self.clone();
        on_disk.password = None;
        on_disk.token = None;
        fs::write(path, serde_json::to_string_pretty(&on_disk)?)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("cortex-chat").join("config.json"))
    }

    /// Environment variables win over file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SNOWFLAKE_ACCOUNT") {
            self.account = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_USER") {
            self.user = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_ROLE") {
            self.role = v;
        }
        if let Some(v) = get("SNOWFLAKE_WAREHOUSE") {
            self.warehouse = v;
        }
        if let Some(v) = get("SNOWFLAKE_DATABASE") {
            self.database = v;
        }
        if let Some(v) = get("SNOWFLAKE_SCHEMA") {
            self.schema = v;
        }
        if let Some(v) = get("SNOWFLAKE_AUTHENTICATOR") {
            self.authenticator = v;
        }
        if let Some(v) = get("SNOWFLAKE_HOST") {
            self.host = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = get("CORTEX_SEMANTIC_MODEL") {
            self.cortex.semantic_model = v;
        }
    }

    pub fn account(&self) -> Result<&str, ConfigError> {
        self.account
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or(ConfigError::Missing("account"))
    }

    pub fn user(&self) -> Result<&str, ConfigError> {
        self.user
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::Missing("user"))
    }

    pub fn auth_method(&self) -> Result<AuthMethod, ConfigError> {
        AuthMethod::from_str(&self.authenticator)
            .ok_or_else(|| ConfigError::UnsupportedAuthenticator(self.authenticator.clone()))
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        Credentials::resolve(
            self.auth_method()?,
            self.password.as_deref(),
            self.token.as_deref(),
        )
    }

    pub fn base_url(&self) -> Result<String, ConfigError> {
        if let Some(host) = self.host.as_deref().filter(|h| !h.trim().is_empty()) {
            let host = host.trim().trim_end_matches('/');
            if host.starts_with("http://") || host.starts_with("https://") {
                return Ok(host.to_string());
            }
            return Ok(format!("https://{}", host));
        }
        Ok(format!(
            "https://{}.snowflakecomputing.com",
            self.account()?.to_lowercase()
        ))
    }

    /// Stage path handed to the analyst, e.g. `@DB.SCHEMA.STAGE/model.yaml`.
    pub fn semantic_model_path(&self) -> String {
        format!(
            "@{}.{}.{}/{}",
            self.cortex.database, self.cortex.schema, self.cortex.stage, self.cortex.semantic_model
        )
    }

    /// Scope of the general-purpose query session.
    pub fn query_target(&self) -> SessionTarget {
        SessionTarget {
            role: self.role.clone(),
            warehouse: self.warehouse.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
        }
    }

    /// Scope of the session used for the analyst API.
    pub fn analyst_target(&self) -> SessionTarget {
        SessionTarget {
            role: self.role.clone(),
            warehouse: self.warehouse.clone(),
            database: self.cortex.database.clone(),
            schema: self.cortex.schema.clone(),
        }
    }

    pub fn target_for(&self, leg: SessionLeg) -> SessionTarget {
        match leg {
            SessionLeg::Query => self.query_target(),
            SessionLeg::Analyst => self.analyst_target(),
        }
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_match_dashboard_setup() {
        let config = Config::new();
        assert_eq!(config.warehouse, "CORTEX_WH");
        assert_eq!(
            config.semantic_model_path(),
            "@MERU_PREPARED.UTILIZATION_DASHBOARD.RAG_YAML/utilization_agent.yaml"
        );
        assert_eq!(config.sql_session, SessionLeg::Query);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::new();
        config.account = Some("from-file".to_string());
        let vars = env(&[
            ("SNOWFLAKE_ACCOUNT", "ORG-ACCT"),
            ("SNOWFLAKE_WAREHOUSE", "SMALL_WH"),
            ("SNOWFLAKE_ROLE", "   "),
        ]);
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.account.as_deref(), Some("ORG-ACCT"));
        assert_eq!(config.warehouse, "SMALL_WH");
        // Blank values are ignored
        assert_eq!(config.role, "MERU_DEVELOPER");
    }

    #[test]
    fn test_base_url_from_account_and_host() {
        let mut config = Config::new();
        assert!(matches!(config.base_url(), Err(ConfigError::Missing("account"))));

        config.account = Some("ORG-ACCT".to_string());
        assert_eq!(config.base_url().unwrap(), "https://org-acct.snowflakecomputing.com");

        config.host = Some("http://127.0.0.1:8080/".to_string());
        assert_eq!(config.base_url().unwrap(), "http://127.0.0.1:8080");

        config.host = Some("acct.privatelink.snowflakecomputing.com".to_string());
        assert_eq!(
            config.base_url().unwrap(),
            "https://acct.privatelink.snowflakecomputing.com"
        );
    }

    #[test]
    fn test_targets_use_different_scopes() {
        let mut config = Config::new();
        config.database = "ANALYTICS".to_string();
        config.cortex.database = "CORTEX_DB".to_string();

        assert_eq!(config.query_target().database, "ANALYTICS");
        assert_eq!(config.analyst_target().database, "CORTEX_DB");
        assert_eq!(config.target_for(SessionLeg::Analyst).schema, config.cortex.schema);
    }

    #[test]
    fn test_externalbrowser_is_rejected() {
        let mut config = Config::new();
        config.authenticator = "externalbrowser".to_string();
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::UnsupportedAuthenticator(_))
        ));
    }

    #[test]
    fn test_save_and_load_skip_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.account = Some("ORG-ACCT".to_string());
        config.password = Some("secret".to_string());
        config.sql_session = SessionLeg::Analyst;
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("secret"));

        let loaded: Config = serde_json::from_str(&written).unwrap();
        assert_eq!(loaded.account.as_deref(), Some("ORG-ACCT"));
        assert_eq!(loaded.sql_session, SessionLeg::Analyst);
        assert!(loaded.password.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let loaded: Config = serde_json::from_str(r#"{"account": "X", "cortex": {"stage": "MODELS"}}"#).unwrap();
        assert_eq!(loaded.warehouse, "CORTEX_WH");
        assert_eq!(loaded.cortex.stage, "MODELS");
        assert_eq!(loaded.cortex.semantic_model, "utilization_agent.yaml");
    }
}
