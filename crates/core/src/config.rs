//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default request body cap (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// The endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_body_bytes == 0 {
            return Err("server.max_body_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Record store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// SQLite database file (single-node deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over individual fields.
        url: Option<String>,
        host: Option<String>,
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        username: Option<String>,
        /// Prefer VAXTRACK_STORE__PASSWORD over storing this in a file.
        password: Option<String>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
    /// Process-local map. Data is lost on restart.
    Memory,
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/vaxtrack.db"),
        }
    }
}

impl StoreConfig {
    /// Validate store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Sqlite { .. } | StoreConfig::Memory => Ok(()),
            StoreConfig::Postgres {
                url,
                host,
                database,
                max_connections,
                ..
            } => {
                if *max_connections == 0 {
                    return Err("store.max_connections must be greater than 0".to_string());
                }
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) => Ok(()),
                    (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// API token configuration.
///
/// The server never stores the token itself, only its SHA-256 digest.
/// Generate with: `echo -n "your-secret-token" | sha256sum`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SHA-256 hex digest of the API token, optionally prefixed with `sha256:`.
    pub token_hash: String,
}

impl AuthConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** SHA-256 of `vaxtrack-test-token`.
    pub fn for_testing() -> Self {
        Self {
            token_hash: "9558caa82332f0950eedddd78ed08d3936b690f9c5124d966cf1e1ec54beff50"
                .to_string(),
        }
    }

    /// The configured digest in lowercase hex, without any prefix.
    pub fn normalized_hash(&self) -> String {
        let hash = self.token_hash.trim();
        let hash = hash
            .get(..7)
            .filter(|prefix| prefix.eq_ignore_ascii_case("sha256:"))
            .map_or(hash, |_| &hash[7..]);
        hash.to_ascii_lowercase()
    }

    pub fn validate(&self) -> Result<(), String> {
        let hash = self.normalized_hash();
        if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(
                "auth.token_hash must be a SHA-256 hex digest (64 hex characters)".to_string(),
            );
        }
        Ok(())
    }
}

/// Confirmation email delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Send confirmation emails after registration (default: true).
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Resend-compatible send endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// API key. Prefer `api_key_env` over storing secrets in config files.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key (default: RESEND_API_KEY).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    /// Sender address.
    #[serde(default = "default_from")]
    pub from: String,
    /// Pending notifications held before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-request timeout for the email API.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Placeholder shipped in sample environment files.
pub const PLACEHOLDER_API_KEY: &str = "your-api-key-here";

/// Keys shorter than this are treated as placeholders.
pub const MIN_API_KEY_LEN: usize = 10;

fn default_notifications_enabled() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("RESEND_API_KEY".to_string())
}

fn default_from() -> String {
    "Vaccination System <onboarding@resend.dev>".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            api_url: default_api_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            from: default_from(),
            queue_capacity: default_queue_capacity(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NotificationConfig {
    /// Configuration with delivery turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Resolve the API key from the config value or its environment variable.
    ///
    /// Returns `None` when no key is set or the key is a placeholder.
    pub fn resolve_api_key(&self) -> Option<String> {
        let key = self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })?;
        let key = key.trim().to_string();
        if is_placeholder_api_key(&key) {
            return None;
        }
        Some(key)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("notifications.queue_capacity must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("notifications.timeout_secs must be greater than 0".to_string());
        }
        if self.enabled && self.api_url.trim().is_empty() {
            return Err("notifications.api_url must not be empty".to_string());
        }
        Ok(())
    }
}

/// Whether `key` looks like an unset or sample API key.
pub fn is_placeholder_api_key(key: &str) -> bool {
    key == PLACEHOLDER_API_KEY || key.len() < MIN_API_KEY_LEN
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// API token configuration (required).
    pub auth: AuthConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Uses the in-memory store, disables email
    /// delivery, and accepts the token `vaxtrack-test-token`.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::Memory,
            auth: AuthConfig::for_testing(),
            notifications: NotificationConfig::disabled(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.store.validate()?;
        self.auth.validate()?;
        self.notifications.validate()?;
        Ok(())
    }
}
