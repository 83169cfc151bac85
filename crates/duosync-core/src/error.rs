// ── Core error types ──
//
// User-facing errors from duosync-core. Consumers never see reqwest or
// tungstenite errors directly; `From<duosync_api::Error>` classifies them
// by variant into domain-level categories.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Hub request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Sync controller has stopped")]
    ControllerStopped,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Hub API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status behind this error, if it came from a hub response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<duosync_api::Error> for CoreError {
    fn from(err: duosync_api::Error) -> Self {
        match err {
            duosync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            duosync_api::Error::Http { status: 404, body } => CoreError::NotFound {
                resource: if body.is_empty() {
                    "hub resource".into()
                } else {
                    body
                },
            },
            duosync_api::Error::Http { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            duosync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            duosync_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Cannot derive push URL from `{scheme}` scheme"),
            },
            duosync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            duosync_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            duosync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            duosync_api::Error::InvalidState(what) => CoreError::Internal(what.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_statuses_are_classified() {
        let not_found: CoreError = duosync_api::Error::Http {
            status: 404,
            body: String::new(),
        }
        .into();
        assert!(matches!(not_found, CoreError::NotFound { .. }));
        assert_eq!(not_found.status(), Some(404));

        let server: CoreError = duosync_api::Error::Http {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert!(matches!(server, CoreError::Api { status: Some(503), .. }));
    }

    #[test]
    fn scheme_errors_are_config_errors() {
        let err: CoreError = duosync_api::Error::UnsupportedScheme("ftp".into()).into();
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
