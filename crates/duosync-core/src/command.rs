// ── Command dispatch ──
//
// Fire-and-forget device control. Inputs are clamped into the hub's
// accepted ranges before anything leaves the process; the outcome is only
// "the hub accepted the request". Actual device state arrives later
// through the sync controller.

use duosync_api::{ControlAction, HubClient};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{
    ColorMode, MAX_BRIGHTNESS, MAX_TEMPERATURE, MIN_BRIGHTNESS, MIN_TEMPERATURE, PowerState, Rgb,
    StatusPatch, clamp_u8, clamp_u16,
};

/// Gain sent with color commands.
const COLOR_GAIN: u8 = 100;
const MAX_WHITE: u8 = 100;
const MAX_GAIN: u8 = 100;

/// A device control request. Numeric fields take raw input and are
/// clamped on dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TurnOn {
        device_ids: Vec<String>,
    },
    TurnOff {
        device_ids: Vec<String>,
    },
    SetColor {
        device_ids: Vec<String>,
        red: f64,
        green: f64,
        blue: f64,
    },
    SetBrightness {
        device_ids: Vec<String>,
        brightness: f64,
    },
    /// Kelvin.
    SetTemperature {
        device_ids: Vec<String>,
        temperature: f64,
    },
    SetWhite {
        device_ids: Vec<String>,
        white: f64,
        gain: f64,
    },
}

impl Command {
    pub fn device_ids(&self) -> &[String] {
        match self {
            Self::TurnOn { device_ids }
            | Self::TurnOff { device_ids }
            | Self::SetColor { device_ids, .. }
            | Self::SetBrightness { device_ids, .. }
            | Self::SetTemperature { device_ids, .. }
            | Self::SetWhite { device_ids, .. } => device_ids,
        }
    }

    pub fn action(&self) -> ControlAction {
        match self {
            Self::TurnOn { .. } => ControlAction::On,
            Self::TurnOff { .. } => ControlAction::Off,
            Self::SetColor { .. } => ControlAction::Color,
            Self::SetBrightness { .. } => ControlAction::Brightness,
            Self::SetTemperature { .. } => ControlAction::Temperature,
            Self::SetWhite { .. } => ControlAction::White,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.device_ids().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: format!("`{}` needs at least one device id", self.action()),
            });
        }
        if let Some(blank) = self.device_ids().iter().find(|id| id.trim().is_empty()) {
            return Err(CoreError::ValidationFailed {
                message: format!("invalid device id {blank:?}"),
            });
        }
        Ok(())
    }

    /// The status change this command is expected to cause, for callers
    /// that update their view before the hub confirms.
    pub fn optimistic_patch(&self) -> StatusPatch {
        let patch = StatusPatch::default();
        match *self {
            Self::TurnOn { .. } => patch.with_state(PowerState::On),
            Self::TurnOff { .. } => patch.with_state(PowerState::Off),
            Self::SetColor {
                red, green, blue, ..
            } => patch
                .with_color(clamped_rgb(red, green, blue))
                .with_mode(ColorMode::Color),
            Self::SetBrightness { brightness, .. } => {
                patch.with_brightness(clamp_u8(brightness, MIN_BRIGHTNESS, MAX_BRIGHTNESS))
            }
            Self::SetTemperature { temperature, .. } => patch
                .with_temperature(clamp_u16(temperature, MIN_TEMPERATURE, MAX_TEMPERATURE))
                .with_mode(ColorMode::White),
            Self::SetWhite { .. } => patch.with_mode(ColorMode::White),
        }
    }
}

fn clamped_rgb(red: f64, green: f64, blue: f64) -> Rgb {
    Rgb::new(
        clamp_u8(red, 0, 255),
        clamp_u8(green, 0, 255),
        clamp_u8(blue, 0, 255),
    )
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// Stateless command sender. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    client: HubClient,
}

impl CommandDispatcher {
    pub fn new(client: HubClient) -> Self {
        Self { client }
    }

    /// Validate, clamp and send `command`.
    ///
    /// `Ok` means the hub accepted the request, nothing more.
    pub async fn dispatch(&self, command: &Command) -> Result<(), CoreError> {
        command.validate()?;
        let ids = command.device_ids();
        info!(action = %command.action(), devices = ids.len(), "dispatching command");

        let result = match *command {
            Command::TurnOn { .. } => self.client.turn_on(ids).await,
            Command::TurnOff { .. } => self.client.turn_off(ids).await,
            Command::SetColor {
                red, green, blue, ..
            } => {
                let rgb = clamped_rgb(red, green, blue);
                self.client
                    .set_color(ids, (rgb.r, rgb.g, rgb.b), COLOR_GAIN)
                    .await
            }
            Command::SetBrightness { brightness, .. } => {
                let brightness = clamp_u8(brightness, MIN_BRIGHTNESS, MAX_BRIGHTNESS);
                self.client.set_brightness(ids, brightness).await
            }
            Command::SetTemperature { temperature, .. } => {
                let kelvin = clamp_u16(temperature, MIN_TEMPERATURE, MAX_TEMPERATURE);
                self.client.set_temperature(ids, kelvin).await
            }
            Command::SetWhite { white, gain, .. } => {
                let white = clamp_u8(white, 0, MAX_WHITE);
                let gain = clamp_u8(gain, 0, MAX_GAIN);
                self.client.set_white(ids, white, gain).await
            }
        };

        result.map_err(|e| {
            debug!(action = %command.action(), error = %e, "command rejected");
            CoreError::from(e)
        })
    }

    // ── Per-action shorthands ────────────────────────────────────────

    pub async fn turn_on(&self, device_ids: Vec<String>) -> Result<(), CoreError> {
        self.dispatch(&Command::TurnOn { device_ids }).await
    }

    pub async fn turn_off(&self, device_ids: Vec<String>) -> Result<(), CoreError> {
        self.dispatch(&Command::TurnOff { device_ids }).await
    }

    pub async fn set_color(
        &self,
        device_ids: Vec<String>,
        red: f64,
        green: f64,
        blue: f64,
    ) -> Result<(), CoreError> {
        self.dispatch(&Command::SetColor {
            device_ids,
            red,
            green,
            blue,
        })
        .await
    }

    pub async fn set_brightness(
        &self,
        device_ids: Vec<String>,
        brightness: f64,
    ) -> Result<(), CoreError> {
        self.dispatch(&Command::SetBrightness {
            device_ids,
            brightness,
        })
        .await
    }

    pub async fn set_temperature(
        &self,
        device_ids: Vec<String>,
        temperature: f64,
    ) -> Result<(), CoreError> {
        self.dispatch(&Command::SetTemperature {
            device_ids,
            temperature,
        })
        .await
    }

    pub async fn set_white(
        &self,
        device_ids: Vec<String>,
        white: f64,
        gain: f64,
    ) -> Result<(), CoreError> {
        self.dispatch(&Command::SetWhite {
            device_ids,
            white,
            gain,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        vec!["a".into()]
    }

    #[test]
    fn empty_targets_fail_validation() {
        let cmd = Command::TurnOn { device_ids: vec![] };
        assert!(matches!(cmd.validate(), Err(CoreError::ValidationFailed { .. })));

        let blank = Command::TurnOff {
            device_ids: vec!["  ".into()],
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn optimistic_patches_are_clamped() {
        let color = Command::SetColor {
            device_ids: ids(),
            red: 300.0,
            green: -1.0,
            blue: 12.4,
        };
        let patch = color.optimistic_patch();
        assert_eq!((patch.red, patch.green, patch.blue), (Some(255), Some(0), Some(12)));
        assert_eq!(patch.mode, Some(ColorMode::Color));

        let temp = Command::SetTemperature {
            device_ids: ids(),
            temperature: 1000.0,
        };
        let patch = temp.optimistic_patch();
        assert_eq!(patch.temperature, Some(3000));
        assert_eq!(patch.mode, Some(ColorMode::White));

        let dim = Command::SetBrightness {
            device_ids: ids(),
            brightness: f64::NAN,
        };
        assert_eq!(dim.optimistic_patch().brightness, Some(1));
    }

    #[test]
    fn on_off_patch_only_power_state() {
        let patch = Command::TurnOff { device_ids: ids() }.optimistic_patch();
        assert_eq!(patch, StatusPatch::default().with_state(PowerState::Off));
    }

    #[test]
    fn actions_map_to_routes() {
        let cmd = Command::SetWhite {
            device_ids: ids(),
            white: 50.0,
            gain: 50.0,
        };
        assert_eq!(cmd.action().route(), "white_multiple");
    }
}
