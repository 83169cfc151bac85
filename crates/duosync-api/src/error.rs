use thiserror::Error;

/// Top-level error type for the `duosync-api` crate.
///
/// Covers every failure mode across the hub's HTTP surfaces (status pull and
/// control routes) and the push WebSocket. `duosync-core` maps these into
/// domain errors and decides which ones are fatal.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL cannot be turned into a push-channel URL.
    #[error("Unsupported URL scheme for push channel: {0}")]
    UnsupportedScheme(String),

    /// TLS or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Hub API ─────────────────────────────────────────────────────
    /// The hub answered with a non-success status code.
    #[error("Hub returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed or broke mid-stream.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// A connection handle was used in a state that does not allow the call.
    #[error("Invalid connection state: {0}")]
    InvalidState(&'static str),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the hub reported the resource as missing.
    ///
    /// The pull path treats this as "no data available" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_is_not_found() {
        let err = Error::Http {
            status: 404,
            body: "Not Found".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Http {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn invalid_state_has_no_status() {
        let err = Error::InvalidState("already connected");
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "Invalid connection state: already connected");
    }
}
