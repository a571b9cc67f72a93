//! Environment-driven configuration.
//!
//! Every knob has a documented default so the service starts with no
//! setup at all. External-service API keys are optional and resolved
//! through [`crate::secrets::env_secret`].
//!
//! | Variable | Default |
//! |---|---|
//! | `SPENDSIGHT_DB_PATH` | `~/.spendsight/data/spendsight.db` |
//! | `SPENDSIGHT_OBJECT_ROOT` | `~/.spendsight/objects` |
//! | `SPENDSIGHT_CONTAINER` | `receipts` |
//! | `SPENDSIGHT_UPLOAD_PREFIX` | `receipts` |
//! | `SPENDSIGHT_UPLOAD_TTL_SECS` | `300` |
//! | `SPENDSIGHT_HOST` / `SPENDSIGHT_PORT` | `127.0.0.1` / `8080` |
//! | `SPENDSIGHT_PUBLIC_URL` | `http://<host>:<port>` |
//! | `SPENDSIGHT_MAX_UPLOAD_BYTES` | `20971520` |
//! | `SPENDSIGHT_HISTORY_WINDOW_DAYS` | `30` |
//! | `SPENDSIGHT_ANALYZER_URL` | `http://127.0.0.1:7010` |
//! | `SPENDSIGHT_ANALYZER_API_KEY` | unset |
//! | `SPENDSIGHT_LLM_URL` | `http://127.0.0.1:7020` |
//! | `SPENDSIGHT_LLM_MODEL` | `spend-analyst-v1` |
//! | `SPENDSIGHT_LLM_MAX_TOKENS` | `500` |
//! | `SPENDSIGHT_LLM_API_KEY` | unset |
//! | `SPENDSIGHT_MAIL_URL` | `http://127.0.0.1:7030` |
//! | `SPENDSIGHT_MAIL_FROM` | `your-email@example.com` |
//! | `SPENDSIGHT_MAIL_TO` | `recipient@example.com` |
//! | `SPENDSIGHT_MAIL_REGION` | `us-west-2` |
//! | `SPENDSIGHT_MAIL_API_KEY` | unset |
//!
//! The ticket key (`SPENDSIGHT_TOKEN_KEY`) is resolved separately by
//! [`crate::secrets::TicketCipher::from_env_or_ephemeral`].

use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use crate::secrets::{env_secret, SecretError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Fully resolved application configuration, constructed once at startup
/// and passed into each component explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub objects: ObjectStoreConfig,
    pub uploads: UploadConfig,
    pub analyzer: AnalyzerConfig,
    pub insight: InsightConfig,
    pub mail: MailConfig,
    /// Trailing window, in days, of history considered by analytics.
    pub history_window_days: i64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL clients use to reach this service; upload credentials
    /// embed it.
    pub public_url: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub root: PathBuf,
    pub container: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Key prefix for freshly generated upload keys.
    pub prefix: String,
    /// Credential validity window in seconds.
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub endpoint: String,
    pub api_key: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct InsightConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_key: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub endpoint: String,
    pub sender: String,
    pub recipient: String,
    pub region: String,
    pub api_key: Option<SecretString>,
}

impl Config {
    /// Loads the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = default_data_dir();

        let host = env_or("SPENDSIGHT_HOST", "127.0.0.1");
        let port: u16 = env_parse("SPENDSIGHT_PORT", 8080)?;
        let public_url = std::env::var("SPENDSIGHT_PUBLIC_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("http://{}:{}", host, port));

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                public_url,
                max_upload_bytes: env_parse("SPENDSIGHT_MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            },
            store: StoreConfig {
                database_path: env_path(
                    "SPENDSIGHT_DB_PATH",
                    data_dir.join("data").join("spendsight.db"),
                ),
            },
            objects: ObjectStoreConfig {
                root: env_path("SPENDSIGHT_OBJECT_ROOT", data_dir.join("objects")),
                container: env_or("SPENDSIGHT_CONTAINER", "receipts"),
            },
            uploads: UploadConfig {
                prefix: env_or("SPENDSIGHT_UPLOAD_PREFIX", "receipts"),
                ttl_secs: env_parse("SPENDSIGHT_UPLOAD_TTL_SECS", 300)?,
            },
            analyzer: AnalyzerConfig {
                endpoint: env_or("SPENDSIGHT_ANALYZER_URL", "http://127.0.0.1:7010"),
                api_key: env_secret("SPENDSIGHT_ANALYZER_API_KEY")?,
            },
            insight: InsightConfig {
                endpoint: env_or("SPENDSIGHT_LLM_URL", "http://127.0.0.1:7020"),
                model: env_or("SPENDSIGHT_LLM_MODEL", "spend-analyst-v1"),
                max_tokens: env_parse("SPENDSIGHT_LLM_MAX_TOKENS", 500)?,
                api_key: env_secret("SPENDSIGHT_LLM_API_KEY")?,
            },
            mail: MailConfig {
                endpoint: env_or("SPENDSIGHT_MAIL_URL", "http://127.0.0.1:7030"),
                sender: env_or("SPENDSIGHT_MAIL_FROM", "your-email@example.com"),
                recipient: env_or("SPENDSIGHT_MAIL_TO", "recipient@example.com"),
                region: env_or("SPENDSIGHT_MAIL_REGION", "us-west-2"),
                api_key: env_secret("SPENDSIGHT_MAIL_API_KEY")?,
            },
            history_window_days: env_parse("SPENDSIGHT_HISTORY_WINDOW_DAYS", 30)?,
        })
    }
}

/// Base directory for defaulted data paths: `~/.spendsight`.
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spendsight")
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_path(var: &str, default: PathBuf) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

/// Parses a typed value from the environment; an unset or empty variable
/// yields the default, a present but unparseable one is an error.
fn env_parse<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "SPENDSIGHT_HOST",
            "SPENDSIGHT_PORT",
            "SPENDSIGHT_PUBLIC_URL",
            "SPENDSIGHT_MAX_UPLOAD_BYTES",
            "SPENDSIGHT_DB_PATH",
            "SPENDSIGHT_OBJECT_ROOT",
            "SPENDSIGHT_CONTAINER",
            "SPENDSIGHT_UPLOAD_PREFIX",
            "SPENDSIGHT_UPLOAD_TTL_SECS",
            "SPENDSIGHT_ANALYZER_URL",
            "SPENDSIGHT_ANALYZER_API_KEY",
            "SPENDSIGHT_LLM_URL",
            "SPENDSIGHT_LLM_MODEL",
            "SPENDSIGHT_LLM_MAX_TOKENS",
            "SPENDSIGHT_LLM_API_KEY",
            "SPENDSIGHT_MAIL_URL",
            "SPENDSIGHT_MAIL_FROM",
            "SPENDSIGHT_MAIL_TO",
            "SPENDSIGHT_MAIL_REGION",
            "SPENDSIGHT_MAIL_API_KEY",
            "SPENDSIGHT_HISTORY_WINDOW_DAYS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.public_url, "http://127.0.0.1:8080");
        assert_eq!(config.uploads.ttl_secs, 300);
        assert_eq!(config.uploads.prefix, "receipts");
        assert_eq!(config.objects.container, "receipts");
        assert_eq!(config.history_window_days, 30);
        assert_eq!(config.insight.max_tokens, 500);
        assert_eq!(config.mail.sender, "your-email@example.com");
        assert_eq!(config.mail.recipient, "recipient@example.com");
        assert_eq!(config.mail.region, "us-west-2");
        assert!(config.analyzer.api_key.is_none());
        assert!(config
            .store
            .database_path
            .to_string_lossy()
            .ends_with("spendsight.db"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("SPENDSIGHT_PORT", "9000");
        std::env::set_var("SPENDSIGHT_MAIL_TO", "me@example.org");
        std::env::set_var("SPENDSIGHT_HISTORY_WINDOW_DAYS", "7");
        std::env::set_var("SPENDSIGHT_DB_PATH", "/tmp/receipts.db");

        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.public_url, "http://127.0.0.1:9000");
        assert_eq!(config.mail.recipient, "me@example.org");
        assert_eq!(config.history_window_days, 7);
        assert_eq!(config.store.database_path, PathBuf::from("/tmp/receipts.db"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_numeric_value_is_an_error() {
        clear_env();
        std::env::set_var("SPENDSIGHT_PORT", "not-a-port");

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref var, .. }) if var == "SPENDSIGHT_PORT"
        ));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_explicit_public_url_wins() {
        clear_env();
        std::env::set_var("SPENDSIGHT_PUBLIC_URL", "https://receipts.example.com");

        let config = Config::from_env().unwrap();
        assert_eq!(config.server.public_url, "https://receipts.example.com");

        clear_env();
    }
}
