//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use duosync_config::ConfigError;
use duosync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to hub at {url}: {reason}")]
    #[diagnostic(
        code(duosync::connection_failed),
        help(
            "Check that the hub is running and reachable.\n\
             Set the address with --api-url or `hub.url` in the config file."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(duosync::timeout),
        help("Increase the timeout with --timeout or check hub responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Hub ──────────────────────────────────────────────────────────
    #[error("{resource} not found on the hub")]
    #[diagnostic(
        code(duosync::not_found),
        help("Check `hub.device_endpoint` in the config file.")
    )]
    NotFound { resource: String },

    #[error("Hub error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(duosync::api_error))]
    Api { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(duosync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(duosync::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(duosync::config),
        help("Check the config file (see `duosync config path`) and DUOSYNC_* variables.")
    )]
    Config(Box<ConfigError>),

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(duosync::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(duosync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } | Self::Config(_) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the configured timeout to a bare timeout error.
    pub fn with_timeout(self, seconds: u64) -> Self {
        match self {
            Self::Timeout { .. } => Self::Timeout { seconds },
            other => other,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Timeout => CliError::Timeout { seconds: 0 },

            CoreError::NotFound { resource } => CliError::NotFound { resource },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api { message, status } => CliError::Api { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::ControllerStopped => {
                CliError::Internal("sync controller stopped unexpectedly".into())
            }

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
