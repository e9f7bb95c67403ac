// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from a local JSON file.
//!
//! When the file is missing, `main` writes a template in its place and exits
//! so the operator can fill in the OAuth credentials.

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "groupplan.config.json";

/// Session lifetime when the config does not set one.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Longest allowed session (one year).
pub const MAX_SESSION_TTL_HOURS: i64 = 365 * 24;

/// Bytes of randomness in a generated session signing key.
const GENERATED_KEY_LEN: usize = 64;

/// OAuth client settings for one identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Provider name as used in `/auth/{provider}` (e.g. "discord")
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Endpoint returning the logged-in user's profile
    pub userinfo_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Discord settings with empty credentials.
    pub fn discord_template() -> Self {
        Self {
            name: "discord".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            authorize_url: "https://discord.com/oauth2/authorize".to_string(),
            token_url: "https://discord.com/api/oauth2/token".to_string(),
            userinfo_url: "https://discord.com/api/users/@me".to_string(),
            scopes: vec!["identify".to_string(), "email".to_string()],
        }
    }
}

/// On-disk shape of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    hostname: String,
    port: u16,
    #[serde(default = "default_database_path")]
    database_path: String,
    /// Session signing secret; a random one is generated per process if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_secret: Option<String>,
    #[serde(default = "default_session_ttl_hours")]
    session_ttl_hours: i64,
    providers: Vec<ProviderConfig>,
}

fn default_database_path() -> String {
    "groupplan.sqlite3".to_string()
}

fn default_session_ttl_hours() -> i64 {
    DEFAULT_SESSION_TTL_HOURS
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public hostname the service is reachable at (cookie domain, callbacks)
    pub hostname: String,
    /// Server port
    pub port: u16,
    /// SQLite database file
    pub database_path: String,
    /// Session token lifetime in hours
    pub session_ttl_hours: i64,
    /// Configured OAuth providers
    pub providers: Vec<ProviderConfig>,
    /// HS256 key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            hostname: "localhost:8080".to_string(),
            port: 8080,
            database_path: ":memory:".to_string(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            providers: vec![ProviderConfig {
                client_id: "test_client_id".to_string(),
                client_secret: "test_secret".to_string(),
                ..ProviderConfig::discord_template()
            }],
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }

    /// Config file path, honoring `GROUPPLAN_CONFIG`.
    pub fn path_from_env() -> PathBuf {
        dotenvy::dotenv().ok(); // Load .env file if present

        env::var("GROUPPLAN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate the config file. `PORT` overrides the file's port.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io(e.to_string())
            }
        })?;
        let file: ConfigFile =
            serde_json::from_str(&data).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {raw}")))?,
            Err(_) => file.port,
        };

        Self::from_file(file, port)
    }

    fn from_file(file: ConfigFile, port: u16) -> Result<Self, ConfigError> {
        if file.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid("hostname must be set".to_string()));
        }
        if file.providers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one OAuth provider must be configured".to_string(),
            ));
        }
        for provider in &file.providers {
            if provider.client_id.is_empty() || provider.client_secret.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider {} is missing client_id or client_secret",
                    provider.name
                )));
            }
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&file.session_ttl_hours) {
            return Err(ConfigError::Invalid(format!(
                "session_ttl_hours must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            )));
        }

        let jwt_signing_key = match file.session_secret {
            Some(secret) if !secret.trim().is_empty() => secret.trim().as_bytes().to_vec(),
            _ => random_key()?,
        };

        Ok(Self {
            hostname: file.hostname.trim().to_string(),
            port,
            database_path: file.database_path,
            session_ttl_hours: file.session_ttl_hours,
            providers: file.providers,
            jwt_signing_key,
            oauth_state_key: random_key()?,
        })
    }

    /// Write a template config for the operator to fill out.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        let template = ConfigFile {
            hostname: String::new(),
            port: 8080,
            database_path: default_database_path(),
            session_secret: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            providers: vec![ProviderConfig::discord_template()],
        };
        let data = serde_json::to_string_pretty(&template)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, data).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Whether the service runs on a development host.
    pub fn is_local(&self) -> bool {
        self.hostname.starts_with("localhost") || self.hostname.starts_with("127.0.0.1")
    }

    /// Base URL clients use to reach the service.
    pub fn public_url(&self) -> String {
        let scheme = if self.is_local() { "http" } else { "https" };
        format!("{}://{}", scheme, self.hostname)
    }

    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

fn random_key() -> Result<Vec<u8>, ConfigError> {
    let mut key = vec![0u8; GENERATED_KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| ConfigError::Random)?;
    Ok(key)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed reading config file: {0}")]
    Io(String),

    #[error("Failed parsing config file: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Secure random generator failed")]
    Random,
}
