//! Environment-driven settings.
//!
//! Every settings struct has a `from_env()` constructor reading the process
//! environment (after `dotenvy`) and a `from_reader()` constructor used by
//! tests with an in-memory map.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

// =============================================================================
// Environment reader
// =============================================================================

/// Key/value source for settings.
pub struct EnvReader<'a> {
    lookup: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl EnvReader<'static> {
    /// Read from the process environment, loading `.env` first.
    pub fn process() -> Self {
        dotenvy::dotenv().ok();
        Self {
            lookup: Box::new(|key| env::var(key).ok()),
        }
    }
}

impl<'a> EnvReader<'a> {
    /// Read from an in-memory map.
    pub fn from_map(map: &'a HashMap<String, String>) -> Self {
        Self {
            lookup: Box::new(move |key| map.get(key).cloned()),
        }
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    pub fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: key.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

// =============================================================================
// General
// =============================================================================

/// Service identity.
#[derive(Debug, Clone)]
pub struct GeneralSettings {
    pub name: String,
    pub env: String,
    pub version: String,
    /// Identity used when a direct endpoint forces an admin caller
    pub admin_auth_id: String,
}

impl GeneralSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            name: vars.required("SERVICE_NAME")?,
            env: vars.required("ENV")?,
            version: vars.required("SERVICE_VERSION")?,
            admin_auth_id: vars.required("ADMIN_AUTH_ID")?,
        })
    }
}

/// Log level; upper-case names such as `DEBUG` or `WARNING` are accepted.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

impl LoggingSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Self {
        Self {
            level: vars.string_or("LOG_LEVEL", "DEBUG"),
        }
    }
}

// =============================================================================
// Stores
// =============================================================================

/// Connection retry bounds shared by every store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetrySettings {
    /// Stop retrying once this much time has passed
    pub max_timeout_seconds: u64,
    /// Upper bound for a single wait between attempts
    pub max_total_delay_seconds: u64,
}

impl ConnectRetrySettings {
    fn from_reader(
        vars: &EnvReader<'_>,
        timeout_key: &str,
        delay_key: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            max_timeout_seconds: vars.parse_or(timeout_key, 10)?,
            max_total_delay_seconds: vars.parse_or(delay_key, 1)?,
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::random_exponential(
            Duration::from_secs(self.max_total_delay_seconds),
            Duration::from_secs(self.max_timeout_seconds),
        )
    }
}

/// Postgres connection and pool settings.
#[derive(Clone)]
pub struct PostgresSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema_name: String,
    pub retry: ConnectRetrySettings,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    pub pool_client_timeout: u64,
    pub pool_max_lifetime: f64,
    pub pool_max_idle: u64,
    pub pool_reconnect_timeout: u64,
}

impl PostgresSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            user: vars.required("POSTGRES_USER")?,
            password: vars.required("POSTGRES_PASSWORD")?,
            host: vars.required("POSTGRES_HOST")?,
            port: vars
                .required("POSTGRES_PORT")?
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                    var: "POSTGRES_PORT".to_string(),
                    reason: e.to_string(),
                })?,
            database: vars.required("POSTGRES_DB")?,
            schema_name: vars.required("POSTGRES_SCHEMA")?,
            retry: ConnectRetrySettings::from_reader(
                vars,
                "POSTGRES_CONNECTION_RETRY_MAX_TIMEOUT_SECONDS",
                "POSTGRES_CONNECTION_RETRY_MAX_TOTAL_DELAY_SECONDS",
            )?,
            pool_min_size: vars.parse_or("POSTGRES_POOL_MIN_SIZE", 4)?,
            pool_max_size: vars.parse_or("POSTGRES_POOL_MAX_SIZE", 20)?,
            pool_client_timeout: vars.parse_or("POSTGRES_POOL_CLIENT_TIMEOUT", 60)?,
            pool_max_lifetime: vars.parse_or("POSTGRES_POOL_MAX_LIFETIME", 3600.0)?,
            pool_max_idle: vars.parse_or("POSTGRES_POOL_MAX_IDLE", 600)?,
            pool_reconnect_timeout: vars.parse_or("POSTGRES_POOL_RECONNECT_TIMEOUT", 180)?,
        })
    }

    /// Connection URL understood by the driver. Credentials and database
    /// name are percent-encoded.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            encode(&self.user),
            encode(&self.password),
            self.host,
            self.port,
            encode(&self.database)
        )
    }
}

fn encode(part: &str) -> String {
    utf8_percent_encode(part, NON_ALPHANUMERIC).to_string()
}

impl fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema_name", &self.schema_name)
            .field("retry", &self.retry)
            .field("pool_min_size", &self.pool_min_size)
            .field("pool_max_size", &self.pool_max_size)
            .finish_non_exhaustive()
    }
}

/// MongoDB connection settings.
#[derive(Clone)]
pub struct MongoSettings {
    pub uri_strings: String,
    pub database: String,
    pub retry: ConnectRetrySettings,
}

impl MongoSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            uri_strings: vars.required("MONGO_URI_STRINGS")?,
            database: vars.required("MONGO_DB")?,
            retry: ConnectRetrySettings::from_reader(
                vars,
                "MONGO_CONNECTION_RETRY_MAX_TIMEOUT_SECONDS",
                "MONGO_CONNECTION_RETRY_MAX_TOTAL_DELAY_SECONDS",
            )?,
        })
    }
}

impl fmt::Debug for MongoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoSettings")
            .field("uri_strings", &"[REDACTED]")
            .field("database", &self.database)
            .field("retry", &self.retry)
            .finish()
    }
}

/// DynamoDB single-table settings.
#[derive(Debug, Clone)]
pub struct DynamoDbSettings {
    pub region: String,
    pub one_table_name: String,
    /// Custom endpoint, e.g. a local emulator
    pub endpoint_url: Option<String>,
    pub retry: ConnectRetrySettings,
}

impl DynamoDbSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            region: vars.required("NAWS_REGION")?,
            one_table_name: vars.required("DYNAMO_ONE_TABLE_NAME")?,
            endpoint_url: vars.optional("DYNAMO_ENDPOINT_URL"),
            retry: ConnectRetrySettings::from_reader(
                vars,
                "DYNAMO_RETRY_MAX_TIMEOUT_SECONDS",
                "DYNAMO_RETRY_MAX_TOTAL_DELAY_SECONDS",
            )?,
        })
    }
}

/// Store backend chosen by `STORE_BACKEND`.
#[derive(Debug, Clone)]
pub enum StoreSettings {
    Postgres(PostgresSettings),
    Mongo(MongoSettings),
    DynamoDb(DynamoDbSettings),
}

impl StoreSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        let backend = vars.required("STORE_BACKEND")?;
        match backend.to_lowercase().as_str() {
            "postgres" => Ok(StoreSettings::Postgres(PostgresSettings::from_reader(vars)?)),
            "mongo" | "mongodb" => Ok(StoreSettings::Mongo(MongoSettings::from_reader(vars)?)),
            "dynamo" | "dynamodb" => {
                Ok(StoreSettings::DynamoDb(DynamoDbSettings::from_reader(vars)?))
            }
            other => Err(ConfigError::Invalid {
                var: "STORE_BACKEND".to_string(),
                reason: format!("unknown store backend {other}"),
            }),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreSettings::Postgres(_) => "Postgres",
            StoreSettings::Mongo(_) => "Mongo",
            StoreSettings::DynamoDb(_) => "DynamoDb",
        }
    }
}

// =============================================================================
// Web API
// =============================================================================

pub const DEFAULT_FLOW_ID_HEADER: &str = "X-Flow-ID";
pub const DEFAULT_CORS_ALLOW_ORIGIN_REGEX: &str = r"^https:\/\/(.*\.|)project.io[\/]?$";

/// HTTP surface settings.
#[derive(Debug, Clone)]
pub struct WebApiSettings {
    pub title: String,
    pub root_path: Option<String>,
    pub flow_correlation_id_incoming_header: String,
    pub correlation_id_outgoing_header: String,
    pub cors_allow_origin_regex: String,
    pub further_prefix: Option<String>,
    pub version: String,
    pub host: String,
    pub port: u16,
}

impl WebApiSettings {
    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            title: vars.required("WEBAPP_TITLE")?,
            root_path: vars.optional("WEBAPP_ROOT_PATH"),
            flow_correlation_id_incoming_header: vars
                .string_or("FLOW_CORRELATION_ID_INCOMING_HEADER", DEFAULT_FLOW_ID_HEADER),
            correlation_id_outgoing_header: vars
                .string_or("FLOW_CORRELATION_ID_OUTGOING_HEADER", DEFAULT_FLOW_ID_HEADER),
            cors_allow_origin_regex: vars
                .string_or("CORS_ALLOW_ORIGIN_REGEX", DEFAULT_CORS_ALLOW_ORIGIN_REGEX),
            further_prefix: vars.optional("WEBAPP_FURTHER_PREFIX"),
            version: vars.string_or("WEBAPP_VERSION", "0"),
            host: vars.string_or("SERVER_HOST", "0.0.0.0"),
            port: vars.parse_or("SERVER_PORT", 3000)?,
        })
    }

    /// Prefix shared by health, docs and versioned routes (`""` when unset).
    pub fn prefix(&self) -> String {
        match self.further_prefix.as_deref().map(|p| p.trim_end_matches('/')) {
            Some(p) if !p.is_empty() && p.starts_with('/') => p.to_string(),
            Some(p) if !p.is_empty() => format!("/{p}"),
            _ => String::new(),
        }
    }

    /// Mount point of the service's own routes, e.g. `/svc/api/v1`.
    pub fn api_prefix(&self) -> String {
        format!("{}/api/v{}", self.prefix(), self.version)
    }
}

// =============================================================================
// Gateways
// =============================================================================

/// Outbound HTTP gateway settings, read from `<PREFIX>_*` variables.
#[derive(Debug, Clone)]
pub struct HttpGatewaySettings {
    pub url: String,
    pub correlation_id_header: String,
    pub retry_attempts: u32,
    pub retry_sleep_time_seconds: f64,
}

impl HttpGatewaySettings {
    pub fn from_reader(vars: &EnvReader<'_>, prefix: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: vars.required(&format!("{prefix}_URL"))?,
            correlation_id_header: vars
                .string_or("FLOW_CORRELATION_ID_INCOMING_HEADER", DEFAULT_FLOW_ID_HEADER),
            retry_attempts: vars.parse_or(&format!("{prefix}_RETRY_ATTEMPTS"), 3)?,
            retry_sleep_time_seconds: vars
                .parse_or(&format!("{prefix}_RETRY_SLEEP_TIME_SECONDS"), 3.0)?,
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.retry_attempts,
            Duration::from_secs_f64(self.retry_sleep_time_seconds.max(0.0)),
        )
    }
}

/// Queue producer settings, read from `<PREFIX>_URL` and `<PREFIX>_REGION`.
#[derive(Debug, Clone)]
pub struct SqsGatewaySettings {
    pub url: String,
    pub correlation_id_header: String,
    pub region: Option<String>,
}

impl SqsGatewaySettings {
    pub fn from_reader(vars: &EnvReader<'_>, prefix: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: vars.required(&format!("{prefix}_URL"))?,
            correlation_id_header: vars
                .string_or("FLOW_CORRELATION_ID_INCOMING_HEADER", DEFAULT_FLOW_ID_HEADER),
            region: vars.optional(&format!("{prefix}_REGION")),
        })
    }
}

// =============================================================================
// Application
// =============================================================================

/// Settings every service starts from.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub app: GeneralSettings,
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub api: WebApiSettings,
}

impl AppSettings {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(&EnvReader::process())
    }

    pub fn from_reader(vars: &EnvReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            app: GeneralSettings::from_reader(vars)?,
            logging: LoggingSettings::from_reader(vars),
            store: StoreSettings::from_reader(vars)?,
            api: WebApiSettings::from_reader(vars)?,
        })
    }
}
