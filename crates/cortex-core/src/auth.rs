use crate::error::ConfigError;

/// How the login request proves the user's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    OAuth,
    ProgrammaticAccessToken,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Password => "snowflake",
            AuthMethod::OAuth => "oauth",
            AuthMethod::ProgrammaticAccessToken => "programmatic_access_token",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "snowflake" | "password" => Some(AuthMethod::Password),
            "oauth" => Some(AuthMethod::OAuth),
            "programmatic_access_token" | "pat" => Some(AuthMethod::ProgrammaticAccessToken),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AuthMethod::Password => "Username / password",
            AuthMethod::OAuth => "OAuth access token",
            AuthMethod::ProgrammaticAccessToken => "Programmatic access token",
        }
    }

    /// Value of the `AUTHENTICATOR` field in the login request.
    pub fn login_authenticator(&self) -> &'static str {
        match self {
            AuthMethod::Password => "SNOWFLAKE",
            AuthMethod::OAuth => "OAUTH",
            AuthMethod::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

/// Secret material for one login.
#[derive(Clone)]
pub enum Credentials {
    Password(String),
    OAuth(String),
    ProgrammaticAccessToken(String),
}

impl Credentials {
    pub fn resolve(
        method: AuthMethod,
        password: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        match method {
            AuthMethod::Password => present(password)
                .map(Credentials::Password)
                .ok_or(ConfigError::Missing("password")),
            AuthMethod::OAuth => present(token)
                .map(Credentials::OAuth)
                .ok_or(ConfigError::Missing("token")),
            AuthMethod::ProgrammaticAccessToken => present(token)
                .or_else(|| present(password))
                .map(Credentials::ProgrammaticAccessToken)
                .ok_or(ConfigError::Missing("token")),
        }
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            Credentials::Password(_) => AuthMethod::Password,
            Credentials::OAuth(_) => AuthMethod::OAuth,
            Credentials::ProgrammaticAccessToken(_) => AuthMethod::ProgrammaticAccessToken,
        }
    }
}

// Secrets never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials({}, <redacted>)", self.method().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(AuthMethod::from_str("SNOWFLAKE"), Some(AuthMethod::Password));
        assert_eq!(AuthMethod::from_str("OAuth"), Some(AuthMethod::OAuth));
        assert_eq!(
            AuthMethod::from_str("programmatic_access_token"),
            Some(AuthMethod::ProgrammaticAccessToken)
        );
        assert_eq!(AuthMethod::from_str("externalbrowser"), None);
    }

    #[test]
    fn test_round_trip_names() {
        for method in [
            AuthMethod::Password,
            AuthMethod::OAuth,
            AuthMethod::ProgrammaticAccessToken,
        ] {
            assert_eq!(AuthMethod::from_str(method.as_str()), Some(method));
        }
    }

    #[test]
    fn test_display_name_accepts_aliases() {
        let pat = AuthMethod::from_str("pat").unwrap();
        assert_eq!(pat.display_name(), "Programmatic access token");
        assert_eq!(pat.login_authenticator(), "PROGRAMMATIC_ACCESS_TOKEN");
        assert_eq!(
            AuthMethod::from_str("password").unwrap().display_name(),
            "Username / password"
        );
    }

    #[test]
    fn test_resolve_requires_secret() {
        let err = Credentials::resolve(AuthMethod::Password, None, Some("tok")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("password")));

        let err = Credentials::resolve(AuthMethod::OAuth, Some("pw"), Some("   ")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("token")));
    }

    #[test]
    fn test_pat_falls_back_to_password_field() {
        let creds =
            Credentials::resolve(AuthMethod::ProgrammaticAccessToken, Some("pat-secret"), None)
                .unwrap();
        assert_eq!(creds.method(), AuthMethod::ProgrammaticAccessToken);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::Password("hunter2".to_string());
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("snowflake"));
    }
}
