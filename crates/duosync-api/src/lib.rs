// duosync-api: Async Rust client for the smart-light hub (status pull, control, push channel)

pub mod error;
pub mod hub;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use hub::{ControlAction, DEFAULT_DEVICE_ENDPOINT, HubClient};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    CloseReason, ConnectionId, ConnectionState, DEFAULT_HANDSHAKE_TIMEOUT, TaggedEvent,
    TransportEvent, WsConnection,
};
