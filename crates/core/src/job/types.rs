//! Core job types shared by the orchestrator and the archive clients.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-assigned job identifier.
pub type JobId = u64;

/// Observation identifier a job operates on.
pub type ObsId = u64;

/// Errors decoding a job snapshot from the wire.
#[derive(Debug, Error)]
pub enum JobDecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown job state code: {0}")]
    UnknownState(i64),

    #[error("unknown job type code: {0}")]
    UnknownType(i64),

    #[error("invalid product size: {0}")]
    InvalidSize(String),
}

/// Kind of work a job performs on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Conversion,
    DownloadVisibilities,
    DownloadMetadata,
    DownloadVoltage,
    Cancel,
}

impl JobType {
    /// Decode the numeric code used by the server.
    pub fn from_code(code: i64) -> Result<Self, JobDecodeError> {
        match code {
            0 => Ok(JobType::Conversion),
            1 => Ok(JobType::DownloadVisibilities),
            2 => Ok(JobType::DownloadMetadata),
            3 => Ok(JobType::DownloadVoltage),
            4 => Ok(JobType::Cancel),
            other => Err(JobDecodeError::UnknownType(other)),
        }
    }

    /// Numeric code used by the server.
    pub fn code(&self) -> i64 {
        match self {
            JobType::Conversion => 0,
            JobType::DownloadVisibilities => 1,
            JobType::DownloadMetadata => 2,
            JobType::DownloadVoltage => 3,
            JobType::Cancel => 4,
        }
    }

    /// Human readable description for status lines.
    pub fn description(&self) -> &'static str {
        match self {
            JobType::Conversion => "conversion",
            JobType::DownloadVisibilities => "download visibilities",
            JobType::DownloadMetadata => "download metadata",
            JobType::DownloadVoltage => "download voltage",
            JobType::Cancel => "cancel job",
        }
    }
}

/// Server-side job state.
///
/// `Queued -> Processing -> ReadyForDownload` is the happy path; `Error`,
/// `Expired` and `Cancelled` are terminal and can be reached from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    ReadyForDownload,
    Error,
    Expired,
    Cancelled,
}

impl JobState {
    /// Decode the numeric code used by the server.
    pub fn from_code(code: i64) -> Result<Self, JobDecodeError> {
        match code {
            0 => Ok(JobState::Queued),
            1 => Ok(JobState::Processing),
            2 => Ok(JobState::ReadyForDownload),
            3 => Ok(JobState::Error),
            4 => Ok(JobState::Expired),
            5 => Ok(JobState::Cancelled),
            other => Err(JobDecodeError::UnknownState(other)),
        }
    }

    /// Numeric code used by the server.
    pub fn code(&self) -> i64 {
        match self {
            JobState::Queued => 0,
            JobState::Processing => 1,
            JobState::ReadyForDownload => 2,
            JobState::Error => 3,
            JobState::Expired => 4,
            JobState::Cancelled => 5,
        }
    }

    /// Label used as the prefix of status lines.
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::Processing => "Processing",
            JobState::ReadyForDownload => "Ready for Download",
            JobState::Error => "Error",
            JobState::Expired => "Expired",
            JobState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One downloadable artifact of a ready job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Remote URL, or a path on shared storage.
    pub locator: String,
    /// Declared size in bytes.
    pub size_bytes: u64,
    /// Server-side content hash, when the server recorded one.
    pub content_hash: Option<String>,
}

impl Product {
    pub fn new(locator: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            locator: locator.into(),
            size_bytes,
            content_hash: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// Classify the locator as a remote URL or a path on shared storage.
    ///
    /// Only http(s) URLs with a non-empty host count as remote.
    pub fn location(&self) -> ProductLocation {
        match reqwest::Url::parse(&self.locator) {
            Ok(url)
                if matches!(url.scheme(), "http" | "https")
                    && url.host_str().is_some_and(|h| !h.is_empty()) =>
            {
                ProductLocation::Remote(url)
            }
            _ => ProductLocation::SharedStorage,
        }
    }
}

/// Where a product's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductLocation {
    /// Must be fetched over the network.
    Remote(reqwest::Url),
    /// Already resident on storage shared with the server.
    SharedStorage,
}

/// Point-in-time snapshot of a server-side job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Taken from the `obs_id` job parameter; `None` if the server omitted it.
    pub obs_id: Option<ObsId>,
    pub job_type: JobType,
    pub state: JobState,
    pub params: BTreeMap<String, String>,
    pub products: Vec<Product>,
    pub error_text: Option<String>,
}

impl Job {
    /// Sum of the declared sizes of every product.
    pub fn total_size(&self) -> u64 {
        self.products.iter().map(|p| p.size_bytes).sum()
    }
}

/// What an event does to the job it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// The job was created or changed; the snapshot supersedes the previous one.
    Upsert,
    /// The job was deleted server-side.
    Delete,
}

/// A state-change notification from the event push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub action: EventAction,
    pub job: Job,
}

impl Event {
    pub fn upsert(job: Job) -> Self {
        Self {
            action: EventAction::Upsert,
            job,
        }
    }

    pub fn delete(job: Job) -> Self {
        Self {
            action: EventAction::Delete,
            job,
        }
    }
}
