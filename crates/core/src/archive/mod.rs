//! Remote archive abstraction.
//!
//! The orchestrator only sees the traits in this module: a `JobService` for
//! submitting and listing jobs, a `FileTransfer` for artifact downloads and an
//! `EventChannel` delivering job state changes. `AsvoConnector` implements
//! them against the real ASVO HTTP API and websocket.

mod asvo;
mod events;
mod types;

pub use asvo::{AsvoClient, AsvoConnector};
pub use events::WsEventChannel;
pub use types::*;
