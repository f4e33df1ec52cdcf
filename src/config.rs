//! Service configuration.
//!
//! TOML file with per-section defaults, so an empty (or missing) file is a
//! runnable dev setup. Secrets prefer environment variables over the file:
//! `QUERYWARDEN_TOKEN_SECRET` and `QUERYWARDEN_API_KEY` override whatever
//! the TOML says.

use crate::auth::token::DEFAULT_TOKEN_TTL_SECS;
use anyhow::{Context, Result};
use rand::RngCore;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub translator: TranslatorSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("querywarden.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC signing secret for session tokens. Empty means "generate a
    /// random one at startup" — fine for dev, but tokens then die with the
    /// process.
    pub token_secret: String,
    /// Session token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorSection {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl Default for TranslatorSection {
    fn default() -> Self {
        Self {
            api_url: None,
            model: None,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply env-var overrides.
    /// A missing file yields pure defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config at {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config at {}", path.display()))?
            }
            Some(path) => {
                tracing::warn!("config file {} not found — using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        // Environment takes priority over the file for secrets.
        if let Ok(secret) = std::env::var("QUERYWARDEN_TOKEN_SECRET") {
            let secret = secret.trim();
            if !secret.is_empty() {
                config.auth.token_secret = secret.to_string();
            }
        }
        if let Ok(key) = std::env::var("QUERYWARDEN_API_KEY") {
            let key = key.trim();
            if !key.is_empty() {
                config.translator.api_key = Some(key.to_string());
            }
        }

        if config.auth.token_secret.is_empty() {
            config.auth.token_secret = random_secret();
            tracing::warn!(
                "no token secret configured — generated an ephemeral one; \
                 sessions will not survive a restart"
            );
        }

        Ok(config)
    }
}

/// 32 random bytes, hex-encoded.
fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_runnable() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [auth]
            token_ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.token_ttl_secs, 60);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[server]\nprot = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn random_secret_is_fresh() {
        assert_ne!(random_secret(), random_secret());
    }
}
