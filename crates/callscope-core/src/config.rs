//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.
//! Vendor credential sections are optional: a missing section means that vendor
//! is not configured, which is surfaced to API callers as a structured error
//! rather than a startup failure.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vendors: VendorsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

/// Vendor credential sections
///
/// Each section is optional; an unconfigured vendor yields
/// `AppError::VendorNotConfigured` when a request needs it.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct VendorsConfig {
    pub ringba: Option<RingbaConfig>,
    pub retreaver: Option<RetreaverConfig>,
    pub twilio: Option<TwilioConfig>,
}

/// Ringba API credentials
#[derive(Debug, Deserialize, Clone)]
pub struct RingbaConfig {
    /// API key sent via the header style discovered by the prober
    pub api_key: String,

    /// Ringba account identifier (path segment of the v2 API)
    pub account_id: String,
}

/// Retreaver API credentials
#[derive(Debug, Deserialize, Clone)]
pub struct RetreaverConfig {
    /// API key appended as a query parameter
    pub api_key: String,

    /// Optional company scope
    pub company_id: Option<String>,
}

/// Twilio API credentials
#[derive(Debug, Deserialize, Clone)]
pub struct TwilioConfig {
    /// Account SID (basic-auth username)
    pub account_sid: String,

    /// Auth token (basic-auth password)
    pub auth_token: String,
}

/// Polling and recording pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Default polling interval for new integrations in minutes
    #[serde(default = "default_sync_interval")]
    pub default_interval_minutes: u64,

    /// Vendor HTTP request timeout in seconds
    #[serde(default = "default_vendor_timeout")]
    pub vendor_timeout_secs: u64,

    /// Recording download timeout in seconds
    #[serde(default = "default_recording_timeout")]
    pub recording_timeout_secs: u64,

    /// Maximum endpoint/auth combinations the Ringba prober may try
    #[serde(default = "default_probe_budget")]
    pub probe_attempt_budget: usize,
}

fn default_sync_interval() -> u64 {
    5
}

fn default_vendor_timeout() -> u64 {
    30
}

fn default_recording_timeout() -> u64 {
    120
}

fn default_probe_budget() -> usize {
    16
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: default_sync_interval(),
            vendor_timeout_secs: default_vendor_timeout(),
            recording_timeout_secs: default_recording_timeout(),
            probe_attempt_budget: default_probe_budget(),
        }
    }
}

/// Transcription collaborator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Speech-to-text submission endpoint
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    /// API key for the transcription vendor
    pub api_key: Option<String>,

    /// Whether recordings are submitted at all
    #[serde(default = "default_transcription_enabled")]
    pub enabled: bool,
}

fn default_transcription_endpoint() -> String {
    "https://api.transcribe.example.com/v1/jobs".to_string()
}

fn default_transcription_enabled() -> bool {
    true
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            api_key: None,
            enabled: default_transcription_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9000)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.url", "postgresql://localhost/callscope")?
            .set_default("database.max_connections", 20)?
            .set_default("sync.default_interval_minutes", 5)?
            .set_default("sync.vendor_timeout_secs", 30)?
            .set_default("sync.recording_timeout_secs", 120)?
            .set_default("sync.probe_attempt_budget", 16)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with CALLSCOPE_ prefix
            .add_source(
                Environment::with_prefix("CALLSCOPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CALLSCOPE").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sync_config() {
        let config = SyncConfig::default();
        assert_eq!(config.default_interval_minutes, 5);
        assert_eq!(config.probe_attempt_budget, 16);
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 9000,
                workers: 1,
                cors_origins: default_cors_origins(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/callscope".to_string(),
                max_connections: 5,
            },
            vendors: VendorsConfig::default(),
            sync: SyncConfig::default(),
            transcription: TranscriptionConfig::default(),
        };
        assert_eq!(config.server_addr(), "127.0.0.1:9000");
    }
}
