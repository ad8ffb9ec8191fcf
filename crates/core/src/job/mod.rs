//! Job data model: server snapshots, push-channel events and submission requests.

mod request;
mod types;
mod wire;

pub use request::{ConversionParams, DownloadParams, JobRequest, VoltageParams};
pub use types::*;
pub use wire::{decode_event, decode_snapshot};
