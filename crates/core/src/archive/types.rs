//! Types for talking to the remote archive.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::job::{Event, Job, JobId, JobRequest};

/// Errors from the remote job service and the event push channel.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("Request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Event channel error: {0}")]
    Channel(String),
}

impl ServiceError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Rejected { .. })
    }
}

/// Errors from a single artifact transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Http(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream error: expected {expected} bytes, wrote {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("No file name in {0}")]
    InvalidLocator(String),
}

/// Job submission and query API of the archive.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit a job; returns the server-assigned id.
    async fn submit_job(&self, request: &JobRequest) -> Result<JobId, ServiceError>;

    /// Every job owned by the caller.
    async fn list_jobs(&self) -> Result<Vec<Job>, ServiceError>;

    async fn cancel_job(&self, job_id: JobId) -> Result<(), ServiceError>;
}

/// Blocking (from the caller's point of view) download of one artifact.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Download `url` to `destination`, returning the number of bytes written.
    async fn fetch(&self, url: &reqwest::Url, destination: &Path) -> Result<u64, TransferError>;
}

/// Ordered stream of job state-change events for the caller's jobs.
#[async_trait]
pub trait EventChannel: Send {
    /// Next event; `None` once the channel is closed or lost.
    async fn receive(&mut self) -> Option<Event>;

    /// Close the channel from our side.
    async fn close(&mut self);
}

/// Authenticated handles returned by a login.
#[derive(Clone)]
pub struct Session {
    pub jobs: Arc<dyn JobService>,
    pub transfer: Arc<dyn FileTransfer>,
}

/// Entry point to the archive: authentication and event subscription.
#[async_trait]
pub trait ArchiveConnector: Send + Sync {
    async fn login(&self) -> Result<Session, ServiceError>;

    async fn connect_events(&self) -> Result<Box<dyn EventChannel>, ServiceError>;
}
