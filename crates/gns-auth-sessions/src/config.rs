//! GNS Auth Session Configuration
//!
//! [`PairingConfig`] holds the protocol policy (lifetimes, grace windows,
//! reject policy) and can be loaded from JSON or set programmatically.
//! [`ServerConfig`] wraps it with the HTTP binding and is loaded from the
//! environment by the `gns-auth-server` binary.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pairing protocol configuration.
///
/// # JSON form
///
/// ```json
/// {
///   "sessionTtlSeconds": 300,
///   "approvedGraceSeconds": 10,
///   "reaperIntervalSeconds": 60,
///   "qrScheme": "gns"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingConfig {
    /// Lifetime of a pending pairing session.
    ///
    /// Default: `300` (5 minutes)
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,

    /// How long an approved session stays readable after the requester
    /// first observed it.
    ///
    /// Default: `10`
    #[serde(default = "default_approved_grace")]
    pub approved_grace_seconds: u64,

    /// Sessions older than `expiresAt` plus this window are reaped whether
    /// or not anyone polled them.
    ///
    /// Default: `300`
    #[serde(default = "default_abandoned_grace")]
    pub abandoned_grace_seconds: u64,

    /// Reaper tick.
    ///
    /// Default: `60`
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,

    /// Lifetime of an approved browser session.
    ///
    /// Default: `7`
    #[serde(default = "default_browser_session_days")]
    pub browser_session_ttl_days: u32,

    /// Requester poll interval used by the client agent.
    ///
    /// Default: `2000`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Scheme of the deep-link form of the QR payload.
    ///
    /// Default: `"gns"`
    #[serde(default = "default_qr_scheme")]
    pub qr_scheme: String,

    /// Accept `reject` calls that carry no signature.
    ///
    /// Default: `false`. Requesters cancel their own session through the
    /// cancel endpoint instead.
    #[serde(default)]
    pub allow_unsigned_reject: bool,

    /// Upper bound on messages carried by a message-sync bundle.
    ///
    /// Default: `1000`
    #[serde(default = "default_max_sync_messages")]
    pub max_sync_messages: usize,
}

fn default_session_ttl() -> u64 {
    300 // 5 minutes
}

fn default_approved_grace() -> u64 {
    10
}

fn default_abandoned_grace() -> u64 {
    300
}

fn default_reaper_interval() -> u64 {
    60
}

fn default_browser_session_days() -> u32 {
    7
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_qr_scheme() -> String {
    "gns".to_string()
}

fn default_max_sync_messages() -> usize {
    1000
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl(),
            approved_grace_seconds: default_approved_grace(),
            abandoned_grace_seconds: default_abandoned_grace(),
            reaper_interval_seconds: default_reaper_interval(),
            browser_session_ttl_days: default_browser_session_days(),
            poll_interval_ms: default_poll_interval_ms(),
            qr_scheme: default_qr_scheme(),
            allow_unsigned_reject: false,
            max_sync_messages: default_max_sync_messages(),
        }
    }
}

impl PairingConfig {
    /// Configuration for local development: faster reaping and polling.
    pub fn development() -> Self {
        Self {
            reaper_interval_seconds: 10,
            poll_interval_ms: 500,
            ..Default::default()
        }
    }

    /// Configuration for production.
    pub fn production() -> Self {
        Self::default()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds as i64)
    }

    pub fn approved_grace(&self) -> Duration {
        Duration::seconds(self.approved_grace_seconds as i64)
    }

    pub fn abandoned_grace(&self) -> Duration {
        Duration::seconds(self.abandoned_grace_seconds as i64)
    }

    pub fn browser_session_ttl(&self) -> Duration {
        Duration::days(self.browser_session_ttl_days as i64)
    }

    pub fn reaper_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.reaper_interval_seconds.max(1))
    }

    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.poll_interval_ms.max(100))
    }

    /// Reject nonsensical combinations before the engine starts.
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_seconds == 0 {
            return Err(Error::Config("sessionTtlSeconds must be positive".into()));
        }
        if self.browser_session_ttl_days == 0 {
            return Err(Error::Config("browserSessionTtlDays must be positive".into()));
        }
        if self.qr_scheme.is_empty()
            || !self
                .qr_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(Error::Config(format!("invalid qrScheme '{}'", self.qr_scheme)));
        }
        Ok(())
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// SQLite database for browser sessions and identities. `None` keeps
    /// everything in memory.
    pub database_path: Option<PathBuf>,
    /// Protocol policy.
    pub pairing: PairingConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `HOST`                           | `0.0.0.0`               |
    /// | `PORT`                           | `3000`                  |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                    |
    /// | `DATABASE_PATH`                  | unset (in-memory)       |
    /// | `PAIRING_SESSION_TTL_SECS`       | `300`                   |
    /// | `PAIRING_REAPER_INTERVAL_SECS`   | `60`                    |
    /// | `PAIRING_ALLOW_UNSIGNED_REJECT`  | `false`                 |
    /// | `PAIRING_QR_SCHEME`              | `gns`                   |
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_parse("PORT", 3000u16)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", 30u64)?;
        let database_path = std::env::var("DATABASE_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let defaults = PairingConfig::default();
        let pairing = PairingConfig {
            session_ttl_seconds: env_parse("PAIRING_SESSION_TTL_SECS", defaults.session_ttl_seconds)?,
            reaper_interval_seconds: env_parse(
                "PAIRING_REAPER_INTERVAL_SECS",
                defaults.reaper_interval_seconds,
            )?,
            allow_unsigned_reject: env_parse("PAIRING_ALLOW_UNSIGNED_REJECT", false)?,
            qr_scheme: std::env::var("PAIRING_QR_SCHEME").unwrap_or(defaults.qr_scheme.clone()),
            ..defaults
        };
        pairing.validate()?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_path,
            pairing,
        })
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
