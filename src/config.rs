//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string. When unset, the gateway runs on the
    /// in-memory persistence backend (local development only).
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Base URL of the remote generation provider API.
    pub provider_base_url: String,

    /// API key sent as a bearer token to the generation provider.
    pub provider_api_key: String,

    /// End-to-end timeout in seconds for a single provider call.
    /// Video generations legitimately take minutes; the default is 300.
    pub provider_timeout_secs: u64,

    /// Root directory for the local artifact store.
    pub storage_root: PathBuf,

    /// Public base URL under which stored artifacts are reachable
    /// (e.g. `http://localhost:3000/files`).
    pub public_base_url: String,

    /// Credits granted to a newly provisioned account.
    pub default_free_credits: i64,

    /// Optional API token seeded into the in-memory authenticator when
    /// running without a database. Ignored on the PostgreSQL backend.
    pub dev_api_token: Option<String>,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let database_url = std::env::var("DATABASE_URL").ok();

        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 10);
        let database_connect_timeout_secs = parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 5);

        let provider_base_url = std::env::var("PROVIDER_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let provider_api_key = std::env::var("PROVIDER_API_KEY").unwrap_or_default();
        let provider_timeout_secs = parse_env("PROVIDER_TIMEOUT_SECS", 300);

        let storage_root = PathBuf::from(
            std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./data/artifacts".to_string()),
        );
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/files".to_string());

        let default_free_credits = parse_env("DEFAULT_FREE_CREDITS", 10);

        let dev_api_token = std::env::var("DEV_API_TOKEN").ok();

        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections,
            database_connect_timeout_secs,
            provider_base_url,
            provider_api_key,
            provider_timeout_secs,
            storage_root,
            public_base_url,
            default_free_credits,
            dev_api_token,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_on_missing() {
        let value: u64 = parse_env("RENDERIQ_TEST_MISSING_KEY", 42);
        assert_eq!(value, 42);
    }
}
