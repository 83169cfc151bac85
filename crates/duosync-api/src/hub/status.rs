// Hub status endpoints
//
// Pull-side reads. Payload shapes vary between hub versions (arrays,
// keyed objects, `devices` wrappers), so these return raw JSON and leave
// interpretation to the normalizer in duosync-core.

use tracing::debug;

use crate::error::Error;
use crate::hub::client::HubClient;

/// Aggregated status route served by the hub.
const STATUS_PATH: &str = "devices/status";

impl HubClient {
    /// Fetch the aggregated status of every known device.
    ///
    /// `GET /devices/status`
    pub async fn devices_status(&self) -> Result<serde_json::Value, Error> {
        let url = self.url(STATUS_PATH)?;
        debug!("fetching aggregated device status");
        self.get_json(url).await
    }

    /// Fetch the device family listing, used as a fallback status source.
    ///
    /// `GET {device_endpoint}`
    pub async fn device_list(&self) -> Result<serde_json::Value, Error> {
        let url = self.device_url("")?;
        debug!(endpoint = self.device_endpoint(), "fetching device listing");
        self.get_json(url).await
    }
}
