//! Example service configuration.

use std::fmt;

use common::{AppSettings, ConfigError, EnvReader, HttpGatewaySettings};

/// Settings read by the use cases.
#[derive(Debug, Clone)]
pub struct UseCaseSettings {
    pub account_id: String,
}

impl UseCaseSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            account_id: vars.required("ACCOUNT_ID")?,
        })
    }
}

/// Outbound services.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub example: HttpGatewaySettings,
}

impl GatewaySettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            example: HttpGatewaySettings::from_reader(vars, "EXAMPLE_GATEWAY")?,
        })
    }
}

/// Example service configuration.
#[derive(Clone)]
pub struct ServiceSettings {
    pub base: AppSettings,
    pub usecase: UseCaseSettings,
    pub gateway: GatewaySettings,
    /// HS256 secret; bearer authentication is off when unset
    pub jwt_secret: Option<String>,
}

impl ServiceSettings {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(&EnvReader::process())
    }

    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            base: AppSettings::from_reader(vars)?,
            usecase: UseCaseSettings::from_reader(vars)?,
            gateway: GatewaySettings::from_reader(vars)?,
            jwt_secret: vars.optional("JWT_SECRET").filter(|s| !s.is_empty()),
        })
    }
}

impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("base", &self.base)
            .field("usecase", &self.usecase)
            .field("gateway", &self.gateway)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub fn vars() -> HashMap<String, String> {
        [
            ("SERVICE_NAME", "example"),
            ("ENV", "test"),
            ("SERVICE_VERSION", "0.3.0"),
            ("ADMIN_AUTH_ID", "admin-token"),
            ("STORE_BACKEND", "postgres"),
            ("POSTGRES_USER", "app"),
            ("POSTGRES_PASSWORD", "s3cret"),
            ("POSTGRES_HOST", "localhost"),
            ("POSTGRES_PORT", "5432"),
            ("POSTGRES_DB", "app"),
            ("POSTGRES_SCHEMA", "public"),
            ("WEBAPP_TITLE", "Example"),
            ("ACCOUNT_ID", "acc-1"),
            ("EXAMPLE_GATEWAY_URL", "http://example.local"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_reader() {
        let vars = vars();
        let settings = ServiceSettings::from_reader(&EnvReader::from_map(&vars)).unwrap();

        assert_eq!(settings.usecase.account_id, "acc-1");
        assert_eq!(settings.gateway.example.url, "http://example.local");
        assert_eq!(settings.gateway.example.retry_attempts, 3);
        assert_eq!(settings.base.app.name, "example");
        assert!(settings.jwt_secret.is_none());
    }

    #[test]
    fn test_account_id_is_required() {
        let mut vars = vars();
        vars.remove("ACCOUNT_ID");
        let err = ServiceSettings::from_reader(&EnvReader::from_map(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("ACCOUNT_ID".into()));
    }

    #[test]
    fn test_jwt_secret_is_redacted() {
        let mut vars = vars();
        vars.insert("JWT_SECRET".into(), "topsecret".into());
        let settings = ServiceSettings::from_reader(&EnvReader::from_map(&vars)).unwrap();

        let debug = format!("{settings:?}");
        assert_eq!(settings.jwt_secret.as_deref(), Some("topsecret"));
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("s3cret"));
    }
}
