//! Logging and error tracking setup for hosts embedding the storefront.

use sentry::integrations::tracing as sentry_tracing;
use sentry::types::{Dsn, ParseDsnError};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, TelemetryConfig};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "qkart_storefront=info";

/// Error installing telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid Sentry DSN: {0}")]
    InvalidDsn(#[from] ParseDsnError),

    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Install the global tracing subscriber and, when a DSN is configured,
/// Sentry.
///
/// The returned guard flushes pending Sentry events when dropped; keep it
/// alive for the life of the process.
///
/// # Errors
///
/// Returns an error if the DSN does not parse or a global subscriber is
/// already installed.
pub fn init(config: &TelemetryConfig) -> Result<Option<sentry::ClientInitGuard>, TelemetryError> {
    // Sentry goes first so the tracing layer finds a bound client
    let guard = config
        .sentry_dsn
        .as_deref()
        .map(init_sentry)
        .transpose()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(
            guard
                .is_some()
                .then(|| sentry_tracing::layer().event_filter(sentry_event_filter)),
        )
        .try_init()?;

    if guard.is_some() {
        tracing::info!("Sentry initialized");
    }
    Ok(guard)
}

fn init_sentry(dsn: &str) -> Result<sentry::ClientInitGuard, TelemetryError> {
    let dsn: Dsn = dsn.parse()?;
    Ok(sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        attach_stacktrace: true,
        ..Default::default()
    }))
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}
