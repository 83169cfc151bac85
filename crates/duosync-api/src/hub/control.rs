// Hub control endpoints
//
// Fire-and-forget device commands via `{device_endpoint}/{action}_multiple`.
// A 2xx answer means the hub accepted the request, not that the device
// changed; the effect shows up later through the status channels.

use tracing::debug;

use crate::error::Error;
use crate::hub::client::HubClient;
use crate::hub::models::{
    BrightnessBody, ColorBody, ControlAction, DeviceIdsBody, TemperatureBody, WhiteBody,
};

impl HubClient {
    /// Turn devices on.
    ///
    /// `POST {endpoint}/on_multiple` with `{"device_ids": [...]}`
    pub async fn turn_on(&self, device_ids: &[String]) -> Result<(), Error> {
        debug!(?device_ids, "turning devices on");
        self.send_control(ControlAction::On, &DeviceIdsBody { device_ids })
            .await
    }

    /// Turn devices off.
    ///
    /// `POST {endpoint}/off_multiple` with `{"device_ids": [...]}`
    pub async fn turn_off(&self, device_ids: &[String]) -> Result<(), Error> {
        debug!(?device_ids, "turning devices off");
        self.send_control(ControlAction::Off, &DeviceIdsBody { device_ids })
            .await
    }

    /// Set an RGB color at the given gain.
    pub async fn set_color(
        &self,
        device_ids: &[String],
        (red, green, blue): (u8, u8, u8),
        gain: u8,
    ) -> Result<(), Error> {
        debug!(?device_ids, red, green, blue, gain, "setting color");
        self.send_control(
            ControlAction::Color,
            &ColorBody {
                device_ids,
                red,
                green,
                blue,
                gain,
            },
        )
        .await
    }

    pub async fn set_brightness(&self, device_ids: &[String], brightness: u8) -> Result<(), Error> {
        debug!(?device_ids, brightness, "setting brightness");
        self.send_control(
            ControlAction::Brightness,
            &BrightnessBody {
                device_ids,
                brightness,
            },
        )
        .await
    }

    /// Set the white color temperature in Kelvin.
    pub async fn set_temperature(
        &self,
        device_ids: &[String],
        temperature: u16,
    ) -> Result<(), Error> {
        debug!(?device_ids, temperature, "setting color temperature");
        self.send_control(
            ControlAction::Temperature,
            &TemperatureBody {
                device_ids,
                temperature,
            },
        )
        .await
    }

    /// Switch devices to the white channel.
    pub async fn set_white(&self, device_ids: &[String], white: u8, gain: u8) -> Result<(), Error> {
        debug!(?device_ids, white, gain, "setting white");
        self.send_control(
            ControlAction::White,
            &WhiteBody {
                device_ids,
                white,
                gain,
            },
        )
        .await
    }

    async fn send_control(
        &self,
        action: ControlAction,
        body: &impl serde::Serialize,
    ) -> Result<(), Error> {
        let url = self.device_url(&action.route())?;
        self.post_json(url, body).await
    }
}
