// Hub HTTP surface: status pull and device control.

pub mod client;
pub mod control;
pub mod models;
pub mod status;

pub use client::{DEFAULT_DEVICE_ENDPOINT, HubClient};
pub use models::ControlAction;
