//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QKART_BACKEND_ENDPOINT` - Base URL of the backend API (e.g. `https://api.qkart.dev/v1`)
//!
//! ## Optional
//! - `QKART_SEARCH_DEBOUNCE_MS` - Search-as-you-type delay (default: 500)
//! - `QKART_REQUEST_TIMEOUT_SECS` - HTTP timeout (default: unset, transport default)
//! - `QKART_SESSION_FILE` - Credential store path (default: .qkart/session.json)
//! - `QKART_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::session::FileCredentialStore;

const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;
const DEFAULT_SESSION_FILE: &str = ".qkart/session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend base URL, always ending in `/`
    pub endpoint: Url,
    /// Quiet period before a search keystroke becomes a request
    pub search_debounce: Duration,
    /// Optional transport timeout; `None` keeps the HTTP client default
    pub request_timeout: Option<Duration>,
    /// Location of the persistent credential store
    pub session_file: PathBuf,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
}

/// Logging and error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Log line format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_endpoint = get_required(&lookup, "QKART_BACKEND_ENDPOINT")?;
        let endpoint = parse_endpoint(&raw_endpoint)
            .map_err(|e| ConfigError::InvalidEnvVar("QKART_BACKEND_ENDPOINT".to_string(), e))?;

        let debounce_ms: u64 = get_parsed_or(
            &lookup,
            "QKART_SEARCH_DEBOUNCE_MS",
            DEFAULT_SEARCH_DEBOUNCE_MS,
        )?;

        let request_timeout = get_optional(&lookup, "QKART_REQUEST_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        ConfigError::InvalidEnvVar(
                            "QKART_REQUEST_TIMEOUT_SECS".to_string(),
                            format!("expected a positive number of seconds, got '{raw}'"),
                        )
                    })
            })
            .transpose()?;

        let session_file = get_optional(&lookup, "QKART_SESSION_FILE")
            .map_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);

        let log_format = get_optional(&lookup, "QKART_LOG_FORMAT")
            .map(|raw| raw.parse::<LogFormat>())
            .transpose()
            .map_err(|e| ConfigError::InvalidEnvVar("QKART_LOG_FORMAT".to_string(), e))?
            .unwrap_or_default();

        Ok(Self {
            endpoint,
            search_debounce: Duration::from_millis(debounce_ms),
            request_timeout,
            session_file,
            telemetry: TelemetryConfig {
                log_format,
                sentry_dsn: get_optional(&lookup, "SENTRY_DSN"),
            },
        })
    }

    /// Persistent credential store at the configured location.
    #[must_use]
    pub fn credential_store(&self) -> FileCredentialStore {
        FileCredentialStore::new(&self.session_file)
    }
}

/// Parse and normalise the backend endpoint.
///
/// The path always ends in `/` so that `Url::join("products")` resolves
/// beneath it instead of replacing the last segment.
pub(crate) fn parse_endpoint(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable; empty values count as missing.
fn get_required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get_optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional variable; empty values count as unset.
fn get_optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Get a parsed variable with a default value.
fn get_parsed_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional(lookup, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
