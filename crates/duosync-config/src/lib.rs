//! Configuration for the duosync CLI and other embedders.
//!
//! A TOML file layered under `DUOSYNC_`-prefixed environment variables,
//! and translation to `duosync_core::SyncConfig`. The CLI applies its own
//! flag overrides on top of the `Config` returned here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use duosync_core::{
    BackoffPolicy, DEFAULT_API_URL, DEFAULT_DEVICE_ENDPOINT, SyncConfig, TlsMode,
};

/// Environment prefix; nested keys use `__`, e.g. `DUOSYNC_HUB__URL`.
pub const ENV_PREFIX: &str = "DUOSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Where the hub lives.
    #[serde(default)]
    pub hub: HubSettings,

    /// Controller pacing.
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HubSettings {
    /// Hub base URL (e.g., "http://192.168.1.20:8000").
    #[serde(default = "default_url")]
    pub url: String,

    /// Push channel URL. Derived from `url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,

    #[serde(default = "default_device_endpoint")]
    pub device_endpoint: String,

    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            ws_url: None,
            device_endpoint: default_device_endpoint(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_device_endpoint() -> String {
    DEFAULT_DEVICE_ENDPOINT.into()
}

/// Controller timing, all durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Try the push channel at all.
    pub push: bool,
    pub poll_interval_ms: u64,
    pub refresh_min_interval_ms: u64,
    /// Push probe cadence while degraded; 0 disables probing.
    pub reprobe_every_polls: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub max_retries: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let backoff = BackoffPolicy::default();
        Self {
            push: true,
            poll_interval_ms: 5000,
            refresh_min_interval_ms: 2000,
            reprobe_every_polls: 12,
            backoff_initial_ms: millis(backoff.initial),
            backoff_max_ms: millis(backoff.max),
            max_retries: backoff.max_retries,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build runtime settings for the controller and dispatcher.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let api_url = parse_url("hub.url", &self.hub.url)?;
        let ws_url = self
            .hub
            .ws_url
            .as_deref()
            .map(|raw| parse_url("hub.ws_url", raw))
            .transpose()?;

        if self.defaults.timeout == 0 {
            return Err(ConfigError::invalid(
                "defaults.timeout",
                "must be at least one second",
            ));
        }

        let tls = if self.hub.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.hub.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        let s = &self.sync;
        let config = SyncConfig {
            ws_url,
            device_endpoint: self.hub.device_endpoint.clone(),
            tls,
            timeout: Duration::from_secs(self.defaults.timeout),
            push_enabled: s.push,
            backoff: BackoffPolicy {
                initial: Duration::from_millis(s.backoff_initial_ms),
                max: Duration::from_millis(s.backoff_max_ms),
                max_retries: s.max_retries,
            },
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            refresh_min_interval: Duration::from_millis(s.refresh_min_interval_ms),
            reprobe_every_polls: s.reprobe_every_polls,
            ..SyncConfig::new(api_url)
        };

        config
            .validate()
            .map_err(|e| ConfigError::invalid("sync", e.to_string()))?;
        Ok(config)
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(field, format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        other => Err(ConfigError::invalid(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "duosync", "duosync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("duosync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from defaults, file and environment.
///
/// `path` overrides the platform location. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
