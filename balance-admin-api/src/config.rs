/// Configuration management for the API server
///
/// Settings come from environment variables, with a `.env` file loaded first
/// when present.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3001)
/// - `APP_ENV`: `development` or `production` (default: development)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `DATABASE_URL`: PostgreSQL connection string; when unset it is built
///   from `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_USER`,
///   `POSTGRES_PASSWORD` and `POSTGRES_DB`
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `RETRY_MAX_ATTEMPTS`: Attempts per unit of work (default: 3)
/// - `RETRY_BASE_DELAY_MS`: First backoff delay (default: 1000)
/// - `RETRY_DEADLINE_MS`: Overall budget per unit of work, 0 disables (default: 30000)
/// - `RUN_MIGRATIONS`: Apply migrations on startup (default: true)
/// - `RUST_LOG`: Log filter (default: info)
///
/// # Example
///
/// ```no_run
/// use balance_admin_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use balance_admin_shared::db::{pool, retry::RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Retry behaviour of the database executor
    pub retry: RetryConfig,

    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("Unknown APP_ENV '{}'", other),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    pub environment: Environment,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl ApiConfig {
    /// Development mode exposes internal error details in responses
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Where to connect
    pub target: DatabaseTarget,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// `DATABASE_URL`, or the discrete `POSTGRES_*` settings when it is unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseTarget {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        #[serde(skip_serializing, default)]
        password: String,
        database: String,
    },
}

impl DatabaseConfig {
    /// Pool settings for [`pool::create_pool`]
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is not a valid connection URL.
    pub fn pool_config(&self) -> Result<pool::DatabaseConfig, sqlx::Error> {
        let base = match &self.target {
            DatabaseTarget::Url(url) => pool::DatabaseConfig::from_url(url)?,
            DatabaseTarget::Parts {
                host,
                port,
                user,
                password,
                database,
            } => pool::DatabaseConfig::from_parts(host, *port, user, password, database),
        };

        Ok(pool::DatabaseConfig {
            max_connections: self.max_connections,
            ..base
        })
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,

    pub base_delay_ms: u64,

    /// 0 means no deadline
    pub deadline_ms: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            deadline: (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms)),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable has an invalid value.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = match lookup("APP_ENV") {
            Some(raw) => raw.parse::<Environment>()?,
            None => Environment::Development,
        };

        let cors_origins = get("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let target = match lookup("DATABASE_URL") {
            Some(url) => DatabaseTarget::Url(url),
            None => DatabaseTarget::Parts {
                host: get("POSTGRES_HOST", "localhost"),
                port: parse_or(&lookup, "POSTGRES_PORT", 5432u16)?,
                user: get("POSTGRES_USER", "myuser"),
                password: get("POSTGRES_PASSWORD", "mypassword"),
                database: get("POSTGRES_DB", "yeet"),
            },
        };

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let database = DatabaseConfig {
            target,
            max_connections,
        };
        database
            .pool_config()
            .context("DATABASE_URL is not a valid PostgreSQL URL")?;

        Ok(Self {
            api: ApiConfig {
                host: get("API_HOST", "0.0.0.0"),
                port: parse_or(&lookup, "API_PORT", 3001u16)?,
                environment,
                cors_origins,
            },
            database,
            retry: RetryConfig {
                max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 3u32)?,
                base_delay_ms: parse_or(&lookup, "RETRY_BASE_DELAY_MS", 1000u64)?,
                deadline_ms: parse_or(&lookup, "RETRY_DEADLINE_MS", 30_000u64)?,
            },
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
