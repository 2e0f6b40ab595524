use std::env;
use thiserror::Error;

/// Fallback signing secret for local runs and tests. Never accepted in production.
pub const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and pulled
/// into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the dev bypass and the log format.
    pub env: Env,
    // Postgres connection string. `None` in local mode selects the in-memory store.
    pub db_url: Option<String>,
    pub db_max_connections: u32,
    // Secret used to sign and validate bearer tokens (HS256).
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub bind_addr: String,
    // Articles per page on the collection endpoint.
    pub page_size: u32,
    // When set, article writes may carry a rating (validated 0..=5).
    pub rating_writable: bool,
    // Superuser created at startup when both are present.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Defines the runtime context: relaxed local development or strict production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Test-friendly configuration: local mode, in-memory store, fixed secret.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            db_max_connections: 5,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_secs: 86_400,
            bind_addr: "0.0.0.0:3000".to_string(),
            page_size: 10,
            rating_writable: false,
            admin_username: None,
            admin_password: None,
        }
    }
}

/// Reads an optional variable and parses it, keeping the default when unset.
fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn flag(name: &'static str) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
        Err(_) => Ok(false),
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Production refuses to start
    /// without `DATABASE_URL` and `JWT_SECRET`; local mode falls back to the in-memory store
    /// and a fixed development secret.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = non_empty("DATABASE_URL");
        let jwt_secret = non_empty("JWT_SECRET");

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(db_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
                jwt_secret.ok_or(ConfigError::Missing("JWT_SECRET"))?,
            ),
            Env::Local => (
                db_url,
                jwt_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let page_size = parsed("ARTICLES_PAGE_SIZE", 10u32)?;
        if !(1..=100).contains(&page_size) {
            return Err(ConfigError::Invalid {
                name: "ARTICLES_PAGE_SIZE",
                value: page_size.to_string(),
            });
        }

        Ok(Self {
            env,
            db_url,
            db_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            token_ttl_secs: parsed("TOKEN_TTL_SECONDS", 86_400)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            page_size,
            rating_writable: flag("ARTICLES_RATING_WRITABLE")?,
            admin_username: non_empty("ADMIN_USERNAME"),
            admin_password: non_empty("ADMIN_PASSWORD"),
        })
    }
}
