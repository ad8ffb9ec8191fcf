//! Job orchestrator: submission, event-driven monitoring and downloads.
//!
//! Concurrency layout for one run:
//! - **Status writer**: one task owning stdout
//! - **Event listener**: one task consuming the event channel
//! - **Download workers**: a fixed pool sharing one queue
//! - **Run loop**: the caller's task, polling the result queue
//!
//! The [`JobRegistry`] is the only state shared between them.

mod config;
mod dispatcher;
mod listener;
mod registry;
mod results;
mod runner;
mod status;
mod types;

pub use config::OrchestratorConfig;
pub use dispatcher::{
    destination_for, download_queue, DownloadDispatcher, DownloadItem, DownloadQueue,
    DownloadReceiver, WorkerContext,
};
pub use listener::{EventListener, ListenerContext};
pub use registry::{JobRegistry, RegistryGuard};
pub use results::{result_channel, JobResult, ResultAggregator, ResultMessage, ResultSink};
pub use runner::JobOrchestrator;
pub use status::{status_channel, StatusMessage, StatusSink, StatusWriter};
pub use types::{DownloadTarget, OrchestratorError, RunMode, RunReport};
