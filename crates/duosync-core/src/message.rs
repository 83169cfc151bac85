// ── Push-channel messages ──
//
// Frames on the push channel are JSON objects tagged with `type`. Batch
// kinds carry their records under `data` (or `devices`); `device_update`
// carries one record's fields at the top level.

use serde_json::Value;
use tracing::debug;

use crate::model::{StatusBatch, StatusPatch};
use crate::normalize::{identified_record, normalize};

/// Outbound frame asking the hub to push a full status batch.
pub const REQUEST_STATUS_FRAME: &str = r#"{"type":"request_status"}"#;

/// A classified inbound push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// `initial_devices`: full snapshot sent after the socket opens.
    InitialSnapshot(StatusBatch),
    /// `devices_status`: batch of current statuses.
    BatchUpdate(StatusBatch),
    /// `device_update`: one device changed.
    DeviceUpdate {
        device_id: String,
        patch: StatusPatch,
    },
    /// A known kind whose payload could not be used.
    Malformed { kind: String },
    /// Unrecognized or missing `type`. Ignored for forward compatibility.
    Unknown { kind: Option<String> },
}

impl SyncMessage {
    /// Classify a text frame. Never fails; bad input becomes `Unknown`
    /// or `Malformed`.
    pub fn parse(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "undecodable push frame");
                return Self::Unknown { kind: None };
            }
        };

        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Self::Unknown { kind: None };
        };

        match kind {
            "initial_devices" => Self::InitialSnapshot(batch_payload(&value)),
            "devices_status" => Self::BatchUpdate(batch_payload(&value)),
            "device_update" => match identified_record(&value) {
                Ok((device_id, patch)) => Self::DeviceUpdate { device_id, patch },
                Err(reason) => {
                    debug!(%reason, "unusable device_update frame");
                    Self::Malformed { kind: kind.to_owned() }
                }
            },
            other => Self::Unknown {
                kind: Some(other.to_owned()),
            },
        }
    }

    /// Kind tag for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::InitialSnapshot(_) => "initial_devices",
            Self::BatchUpdate(_) => "devices_status",
            Self::DeviceUpdate { .. } => "device_update",
            Self::Malformed { kind } => kind,
            Self::Unknown { kind } => kind.as_deref().unwrap_or("<untyped>"),
        }
    }
}

/// Normalize the collection a batch frame carries. A frame without one
/// yields an empty batch.
fn batch_payload(value: &Value) -> StatusBatch {
    match value.get("data").or_else(|| value.get("devices")) {
        Some(inner) => normalize(inner),
        None => StatusBatch::new(),
    }
}
