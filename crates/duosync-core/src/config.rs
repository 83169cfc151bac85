// ── Runtime sync configuration ──
//
// Describes *where* the hub lives and *how* the controller paces itself.
// Never touches disk; duosync-config (or any embedder) builds a
// `SyncConfig` and hands it in.

use std::time::Duration;

use duosync_api::{DEFAULT_DEVICE_ENDPOINT, HubClient, TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Exponential reconnect schedule for the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Failures tolerated before falling back to polling.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(30_000),
            max_retries: 3,
        }
    }
}

impl BackoffPolicy {
    /// `min(initial * 2^attempt, max)`. No jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Everything the sync controller and command dispatcher need.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hub root, e.g. `http://localhost:8000`.
    pub api_url: Url,
    /// Push channel URL. Derived from `api_url` when unset.
    pub ws_url: Option<Url>,
    /// Route prefix of the device family.
    pub device_endpoint: String,
    pub tls: TlsMode,
    /// Per-request HTTP timeout. Also bounds each push handshake.
    pub timeout: Duration,
    /// When false the controller polls from the start.
    pub push_enabled: bool,
    pub backoff: BackoffPolicy,
    pub poll_interval: Duration,
    /// Minimum spacing between accepted refreshes.
    pub refresh_min_interval: Duration,
    /// Open a push probe every N polls while degraded. 0 disables.
    pub reprobe_every_polls: u32,
}

impl SyncConfig {
    /// Defaults for everything but the hub address.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            ws_url: None,
            device_endpoint: DEFAULT_DEVICE_ENDPOINT.to_owned(),
            tls: TlsMode::System,
            timeout: Duration::from_secs(10),
            push_enabled: true,
            backoff: BackoffPolicy::default(),
            poll_interval: Duration::from_millis(5000),
            refresh_min_interval: Duration::from_millis(2000),
            reprobe_every_polls: 12,
        }
    }

    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval must be greater than zero".into(),
            });
        }
        if self.backoff.initial.is_zero() || self.backoff.max < self.backoff.initial {
            return Err(CoreError::Config {
                message: "backoff must start above zero and not exceed its maximum".into(),
            });
        }
        if self.device_endpoint.trim_matches('/').is_empty() {
            return Err(CoreError::Config {
                message: "device endpoint must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }

    /// Build the HTTP client for pulls and commands.
    pub fn hub_client(&self) -> Result<HubClient, CoreError> {
        Ok(HubClient::new(
            self.api_url.clone(),
            self.device_endpoint.clone(),
            &self.transport(),
        )?)
    }

    /// The configured push URL, or one derived from `api_url`.
    pub fn push_url(&self) -> Result<Url, CoreError> {
        match &self.ws_url {
            Some(url) => Ok(url.clone()),
            None => Ok(self.hub_client()?.push_url()?),
        }
    }
}
