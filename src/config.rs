use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::auth::TokenConfig;
use crate::event::HubConfig;
use crate::settlement::DEFAULT_PAYMENT_METHOD;
use crate::websockets::SessionConfig;

/// Process configuration, read once at startup
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// In-memory stores are used when unset
    pub database_url: Option<String>,
    pub hub: HubConfig,
    pub session: SessionConfig,
    pub payment_method: String,
    pub token: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let hub_defaults = HubConfig::default();

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            hub: HubConfig {
                intake_capacity: parse_or(
                    &lookup,
                    "HUB_INTAKE_CAPACITY",
                    hub_defaults.intake_capacity,
                ),
                session_queue_capacity: parse_or(
                    &lookup,
                    "SESSION_QUEUE_CAPACITY",
                    hub_defaults.session_queue_capacity,
                ),
            },
            session: session_from_lookup(&lookup),
            payment_method: lookup("PAYMENT_METHOD")
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            token: match lookup("JWT_SECRET") {
                Some(secret) => TokenConfig::with_secret(secret),
                None => TokenConfig::new(),
            },
        }
    }
}

/// Session timing; the ping interval stays below the liveness timeout
fn session_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> SessionConfig {
    let defaults = SessionConfig::default();
    let session = SessionConfig {
        ping_interval: Duration::from_secs(parse_or(
            lookup,
            "WS_PING_INTERVAL_SECS",
            defaults.ping_interval.as_secs(),
        )),
        liveness_timeout: Duration::from_secs(parse_or(
            lookup,
            "WS_LIVENESS_TIMEOUT_SECS",
            defaults.liveness_timeout.as_secs(),
        )),
    };

    if session.ping_interval >= session.liveness_timeout {
        warn!(
            ping_interval_secs = session.ping_interval.as_secs(),
            liveness_timeout_secs = session.liveness_timeout.as_secs(),
            "Ping interval must be shorter than the liveness timeout, using defaults"
        );
        return defaults;
    }
    session
}

/// Parses a positive number, falling back to `default` on absence or garbage
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                warn!(key = key, value = %raw, "Ignoring invalid configuration value");
                default
            }
        },
    }
}
