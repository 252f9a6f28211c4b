//! Environment-driven configuration for the three services.
//!
//! Every loader takes a lookup function so tests can supply variables without
//! touching the process environment; `from_env` passes `std::env::var`.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "notification";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid socket address: '{value}'")]
    InvalidBindAddr { name: &'static str, value: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

/// Connection strings used when `USE_PERSISTENT_STORES=true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentStores {
    pub database_url: String,
    pub redis_url: String,
}

/// Core service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs on in-memory stores and an in-process bus.
    pub persistent: Option<PersistentStores>,
    pub notification_channel: String,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = bind_addr(&lookup, "CORE_BIND_ADDR", "0.0.0.0:8080")?;
        let persistent = if use_persistent_stores(&lookup) {
            let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            Some(PersistentStores {
                database_url,
                redis_url: or_default(&lookup, "REDIS_URL", DEFAULT_REDIS_URL),
            })
        } else {
            None
        };

        Ok(Self {
            bind_addr,
            persistent,
            notification_channel: or_default(
                &lookup,
                "NOTIFICATION_CHANNEL",
                DEFAULT_NOTIFICATION_CHANNEL,
            ),
        })
    }
}

/// Purchase-order service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderConfig {
    pub bind_addr: SocketAddr,
    pub core_service_url: String,
    /// `Some` stores error records in Redis; `None` keeps them in memory.
    pub redis_url: Option<String>,
}

impl PurchaseOrderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = bind_addr(&lookup, "PURCHASE_ORDER_BIND_ADDR", "0.0.0.0:8081")?;
        let core_service_url = or_default(&lookup, "CORE_SERVICE_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();
        let redis_url = use_persistent_stores(&lookup)
            .then(|| or_default(&lookup, "REDIS_URL", DEFAULT_REDIS_URL));

        Ok(Self {
            bind_addr,
            core_service_url,
            redis_url,
        })
    }
}

/// Notification service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub bind_addr: SocketAddr,
    /// `Some` subscribes over Redis pub/sub; `None` uses an in-process bus.
    pub redis_url: Option<String>,
    pub notification_channel: String,
    pub show_notification_count: bool,
}

impl NotificationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = bind_addr(&lookup, "NOTIFICATION_BIND_ADDR", "0.0.0.0:8082")?;
        let redis_url = use_persistent_stores(&lookup)
            .then(|| or_default(&lookup, "REDIS_URL", DEFAULT_REDIS_URL));

        Ok(Self {
            bind_addr,
            redis_url,
            notification_channel: or_default(
                &lookup,
                "NOTIFICATION_CHANNEL",
                DEFAULT_NOTIFICATION_CHANNEL,
            ),
            show_notification_count: flag(&lookup, "SHOW_NOTIFICATION_COUNT_ENABLED"),
        })
    }
}

fn or_default(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            warn!(var = name, default, "environment variable not set; using default");
            default.to_string()
        }
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    lookup(name)
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(false)
}

fn use_persistent_stores(lookup: &impl Fn(&str) -> Option<String>) -> bool {
    flag(lookup, "USE_PERSISTENT_STORES")
}

fn bind_addr(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let raw = or_default(lookup, name, default);
    raw.parse().map_err(|_| ConfigError::InvalidBindAddr { name, value: raw })
}
