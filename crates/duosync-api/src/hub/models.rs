// Hub control route request bodies
//
// Field names match what the hub expects on the wire. Values are taken as
// already validated; clamping is the caller's job.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter};

/// Control actions exposed by the hub, one POST route each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ControlAction {
    On,
    Off,
    Color,
    Brightness,
    Temperature,
    White,
}

impl ControlAction {
    /// Route suffix under the device endpoint, e.g. `color_multiple`.
    pub fn route(self) -> String {
        format!("{}_multiple", self.as_ref())
    }
}

/// `{ "device_ids": [...] }` for on/off.
#[derive(Debug, Serialize)]
pub struct DeviceIdsBody<'a> {
    pub device_ids: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct ColorBody<'a> {
    pub device_ids: &'a [String],
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub gain: u8,
}

#[derive(Debug, Serialize)]
pub struct BrightnessBody<'a> {
    pub device_ids: &'a [String],
    pub brightness: u8,
}

#[derive(Debug, Serialize)]
pub struct TemperatureBody<'a> {
    pub device_ids: &'a [String],
    pub temperature: u16,
}

#[derive(Debug, Serialize)]
pub struct WhiteBody<'a> {
    pub device_ids: &'a [String],
    pub white: u8,
    pub gain: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_action_has_a_multiple_route() {
        let routes: Vec<String> = ControlAction::iter().map(ControlAction::route).collect();
        assert_eq!(
            routes,
            [
                "on_multiple",
                "off_multiple",
                "color_multiple",
                "brightness_multiple",
                "temperature_multiple",
                "white_multiple",
            ]
        );
    }

    #[test]
    fn color_body_uses_wire_names() {
        let ids = vec!["a".to_owned()];
        let body = ColorBody {
            device_ids: &ids,
            red: 1,
            green: 2,
            blue: 3,
            gain: 100,
        };
        let json = serde_json::to_value(&body).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({ "device_ids": ["a"], "red": 1, "green": 2, "blue": 3, "gain": 100 })
        );
    }
}
