// Hub HTTP client
//
// Wraps `reqwest::Client` with hub-specific URL construction and response
// checking. Endpoint groups (status pull, device control) are implemented
// as inherent methods in sibling files to keep this module focused on
// transport mechanics.

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default route prefix for the RGBW device family on the hub.
pub const DEFAULT_DEVICE_ENDPOINT: &str = "/shelly/duorgbw";

/// Path of the push channel relative to the hub host.
const PUSH_PATH: &str = "/ws";

/// Raw HTTP client for the smart-light hub.
///
/// All methods return decoded JSON or `()`; non-success statuses are turned
/// into [`Error::Http`] before the caller sees them.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
    device_endpoint: String,
}

impl HubClient {
    /// Create a new hub client from a `TransportConfig`.
    ///
    /// `base_url` is the hub root (e.g. `http://localhost:8000`);
    /// `device_endpoint` is the route prefix of the device family
    /// (e.g. [`DEFAULT_DEVICE_ENDPOINT`]).
    pub fn new(
        base_url: Url,
        device_endpoint: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, device_endpoint))
    }

    /// Create a hub client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        device_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            device_endpoint: device_endpoint.into(),
        }
    }

    /// The hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The device family route prefix.
    pub fn device_endpoint(&self) -> &str {
        &self.device_endpoint
    }

    /// Derive the push-channel URL from the base URL.
    ///
    /// `http` becomes `ws`, `https` becomes `wss`, the path is replaced
    /// with `/ws`. Host and port are kept.
    pub fn push_url(&self) -> Result<Url, Error> {
        let scheme = match self.base_url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(Error::UnsupportedScheme(other.to_owned())),
        };

        let mut url = self.base_url.clone();
        url.set_scheme(scheme)
            .map_err(|()| Error::UnsupportedScheme(self.base_url.scheme().to_owned()))?;
        url.set_path(PUSH_PATH);
        url.set_query(None);
        Ok(url)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a hub path: `{base}/{path}`.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    /// Build a device-family URL: `{base}{device_endpoint}/{suffix}`.
    ///
    /// An empty suffix addresses the endpoint itself.
    pub(crate) fn device_url(&self, suffix: &str) -> Result<Url, Error> {
        let endpoint = self.device_endpoint.trim_matches('/');
        if suffix.is_empty() {
            self.url(endpoint)
        } else {
            self.url(&format!("{endpoint}/{suffix}"))
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the body as arbitrary JSON.
    pub(crate) async fn get_json(&self, url: Url) -> Result<serde_json::Value, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let body = Self::checked_body(resp).await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Send a POST request with a JSON body, discarding the response body.
    ///
    /// The hub's control routes answer before the device has acted, so the
    /// body carries nothing worth interpreting.
    pub(crate) async fn post_json(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        Self::checked_body(resp).await?;
        Ok(())
    }

    /// Read the response body, turning non-2xx statuses into [`Error::Http`].
    async fn checked_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}
