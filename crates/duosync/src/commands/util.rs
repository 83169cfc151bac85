//! Shared helpers for command handlers.

use tabled::Tabled;

use duosync_core::{ColorMode, DeviceStatus};

use crate::output::Painter;

// ── Device rendering ────────────────────────────────────────────────

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "Device")]
    id: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Energy")]
    energy: String,
}

pub fn device_row(id: &str, s: &DeviceStatus, painter: Painter) -> DeviceRow {
    // Only the active channel set is meaningful; the other column is dimmed.
    let (color, temperature) = match s.mode {
        ColorMode::Color => (s.color.to_string(), painter.dim(&kelvin(s))),
        ColorMode::White => (painter.dim(&s.color.to_string()), kelvin(s)),
    };
    DeviceRow {
        id: id.to_owned(),
        state: painter.state(s.state),
        mode: s.mode.to_string(),
        color,
        brightness: format!("{}%", s.brightness),
        temperature,
        power: format!("{:.1} W", s.power),
        energy: format!("{:.3} kWh", s.energy),
    }
}

/// One-line summary for plain output and watch mode.
pub fn device_line(id: &str, s: &DeviceStatus) -> String {
    let channel = match s.mode {
        ColorMode::Color => s.color.to_string(),
        ColorMode::White => kelvin(s),
    };
    format!(
        "{id} {} {} {channel} {}% {:.1}W {:.3}kWh",
        s.state, s.mode, s.brightness, s.power, s.energy
    )
}

fn kelvin(s: &DeviceStatus) -> String {
    format!("{}K", s.temperature)
}
