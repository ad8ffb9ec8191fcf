//! Types for the job orchestrator.

use thiserror::Error;

use crate::archive::ServiceError;
use crate::config::ConfigError;
use crate::job::{JobId, JobRequest};
use crate::submission::SubmissionError;

use super::results::JobResult;

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed submission file.
    #[error(transparent)]
    Input(#[from] SubmissionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote job service failure outside the recoverable cases.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The event channel closed while jobs were still outstanding.
    #[error("Error: Control connection lost, exiting")]
    ConnectionLost,

    /// Submission of one job failed for a reason other than a rejection.
    #[error("Error submitting job #{index} from csv file: {source}")]
    Submission {
        index: usize,
        #[source]
        source: ServiceError,
    },
}

impl OrchestratorError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrchestratorError::Input(_) => 3,
            OrchestratorError::Service(e) | OrchestratorError::Submission { source: e, .. }
                if e.is_rejection() =>
            {
                2
            }
            _ => 1,
        }
    }
}

/// Which jobs a download-only run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTarget {
    /// Every job currently ready for download.
    AllReady,
    Job(JobId),
}

impl DownloadTarget {
    /// `0` selects every ready job, as on the command line.
    pub fn from_id(job_id: JobId) -> Self {
        if job_id == 0 {
            DownloadTarget::AllReady
        } else {
            DownloadTarget::Job(job_id)
        }
    }
}

/// What a run does.
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Submit, watch events, download ready jobs.
    Full { requests: Vec<JobRequest> },
    /// Submit, then stop.
    SubmitOnly { requests: Vec<JobRequest> },
    /// Print a status line for every job, then stop.
    ListOnly,
    /// Download already-ready jobs without watching events.
    DownloadOnly { target: DownloadTarget },
    /// Ask the server to cancel a job, then stop.
    Cancel { job_id: JobId },
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Full { .. } => "full",
            RunMode::SubmitOnly { .. } => "submit-only",
            RunMode::ListOnly => "list-only",
            RunMode::DownloadOnly { .. } => "download-only",
            RunMode::Cancel { .. } => "cancel",
        }
    }
}

/// Outcome of a run that reached the report phase.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Terminal results, in the order they were collected.
    pub results: Vec<JobResult>,
    /// Job ids that were tracked during the run.
    pub tracked: Vec<JobId>,
    /// Job ids in the order they stopped being tracked.
    pub released: Vec<JobId>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.results.is_empty()
    }

    /// Exit code for a completed run: 4 when any result was collected.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            4
        }
    }
}
