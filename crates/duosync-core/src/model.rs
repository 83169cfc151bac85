// ── Canonical device model ──
//
// `DeviceStatus` is what the store holds: always fully formed. Everything
// that arrives from the hub is first turned into a `StatusPatch` and merged
// on top of the previous record (or the default one).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Domain bounds ───────────────────────────────────────────────────

pub const MIN_BRIGHTNESS: u8 = 1;
pub const MAX_BRIGHTNESS: u8 = 100;
pub const MIN_TEMPERATURE: u16 = 3000;
pub const MAX_TEMPERATURE: u16 = 6500;
pub const DEFAULT_TEMPERATURE: u16 = 4750;

/// Round and clamp into `[min, max]`. NaN maps to `min`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub(crate) fn clamp_u8(value: f64, min: u8, max: u8) -> u8 {
    if value.is_nan() {
        return min;
    }
    value.round().clamp(f64::from(min), f64::from(max)) as u8
}

/// Round and clamp into `[min, max]`. NaN maps to `min`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub(crate) fn clamp_u16(value: f64, min: u16, max: u16) -> u16 {
    if value.is_nan() {
        return min;
    }
    value.round().clamp(f64::from(min), f64::from(max)) as u16
}

/// Non-negative reading; NaN and negatives become zero.
pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

// ── Enums ───────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PowerState {
    On,
    #[default]
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Which LED channel set drives the output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColorMode {
    #[default]
    Color,
    White,
}

/// 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ── DeviceStatus ────────────────────────────────────────────────────

/// Canonical, fully formed status of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub state: PowerState,
    pub color: Rgb,
    /// Instantaneous draw in watts.
    pub power: f64,
    /// Cumulative consumption in kWh as reported by the device. Never
    /// integrated locally.
    pub energy: f64,
    /// Percent, `1..=100`.
    pub brightness: u8,
    /// Kelvin, `3000..=6500`.
    pub temperature: u16,
    pub mode: ColorMode,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            state: PowerState::Off,
            color: Rgb::WHITE,
            power: 0.0,
            energy: 0.0,
            brightness: MAX_BRIGHTNESS,
            temperature: DEFAULT_TEMPERATURE,
            mode: ColorMode::Color,
        }
    }
}

impl DeviceStatus {
    /// Copy of `self` with `patch` applied.
    pub fn merged(&self, patch: &StatusPatch) -> Self {
        let mut next = self.clone();
        patch.apply_to(&mut next);
        next
    }

    pub fn is_on(&self) -> bool {
        self.state.is_on()
    }
}

// ── StatusPatch ─────────────────────────────────────────────────────

/// A partial status update. Unset fields leave the stored value alone.
///
/// Color channels are independent, so a patch carrying only `red` keeps
/// the previous green and blue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ColorMode>,
}

impl StatusPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_state(mut self, state: PowerState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.red = Some(color.r);
        self.green = Some(color.g);
        self.blue = Some(color.b);
        self
    }

    pub fn with_power(mut self, watts: f64) -> Self {
        self.power = Some(non_negative(watts));
        self
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS));
        self
    }

    pub fn with_temperature(mut self, kelvin: u16) -> Self {
        self.temperature = Some(kelvin.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE));
        self
    }

    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Write every set field into `status`.
    pub fn apply_to(&self, status: &mut DeviceStatus) {
        if let Some(state) = self.state {
            status.state = state;
        }
        if let Some(r) = self.red {
            status.color.r = r;
        }
        if let Some(g) = self.green {
            status.color.g = g;
        }
        if let Some(b) = self.blue {
            status.color.b = b;
        }
        if let Some(power) = self.power {
            status.power = power;
        }
        if let Some(energy) = self.energy {
            status.energy = energy;
        }
        if let Some(brightness) = self.brightness {
            status.brightness = brightness;
        }
        if let Some(temperature) = self.temperature {
            status.temperature = temperature;
        }
        if let Some(mode) = self.mode {
            status.mode = mode;
        }
    }

    /// Fold `later` into `self`; fields set in `later` win.
    pub fn merge(&mut self, later: &StatusPatch) {
        self.state = later.state.or(self.state);
        self.red = later.red.or(self.red);
        self.green = later.green.or(self.green);
        self.blue = later.blue.or(self.blue);
        self.power = later.power.or(self.power);
        self.energy = later.energy.or(self.energy);
        self.brightness = later.brightness.or(self.brightness);
        self.temperature = later.temperature.or(self.temperature);
        self.mode = later.mode.or(self.mode);
    }
}

/// Normalized patches keyed by device id.
pub type StatusBatch = BTreeMap<String, StatusPatch>;
