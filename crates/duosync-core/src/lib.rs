// duosync-core: Device-state synchronization between a smart-light hub and its consumers.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod model;
pub mod normalize;
pub mod store;
pub mod stream;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandDispatcher};
pub use config::{BackoffPolicy, DEFAULT_API_URL, SyncConfig};
pub use controller::{RefreshOutcome, SkipReason, SyncController, SyncPhase, TransportMode};
pub use error::CoreError;
pub use message::SyncMessage;
pub use model::{ColorMode, DeviceStatus, PowerState, Rgb, StatusBatch, StatusPatch};
pub use store::{StateStore, StatusSnapshot, StoreChange, Subscription};
pub use stream::StatusStream;

// Wire-level types embedders need when building a `SyncConfig`.
pub use duosync_api::{DEFAULT_DEVICE_ENDPOINT, TlsMode};

pub use transport::{HubStatusSource, PushConnection, PushConnector, StatusSource, WsConnector};
