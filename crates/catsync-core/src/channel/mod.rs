//! Push update channel (`/ws/category-updates/`).
//!
//! - `machine`: the connection state machine as a pure reducer
//! - `backoff`: bounded exponential reconnect policy
//! - `socket`: socket factory traits and the tokio-tungstenite implementation

pub mod backoff;
pub mod machine;
pub mod socket;

pub use backoff::ReconnectPolicy;
pub use machine::{
    transition, ChannelEvent, ChannelState, ConnectionStatus, Effect, NORMAL_CLOSURE,
};
pub use socket::{
    ChannelError, FrameSink, FrameStream, SocketConnector, SocketFrame, SocketPair, WsConnector,
};
