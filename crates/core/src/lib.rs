pub mod archive;
pub mod config;
pub mod job;
pub mod message;
pub mod orchestrator;
pub mod report;
pub mod submission;
pub mod testing;

pub use archive::{
    ArchiveConnector, AsvoClient, AsvoConnector, EventChannel, FileTransfer, JobService,
    ServiceError, Session, TransferError, WsEventChannel,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use job::{Event, EventAction, Job, JobId, JobRequest, JobState, JobType, ObsId, Product};
pub use orchestrator::{
    DownloadTarget, JobOrchestrator, JobRegistry, JobResult, OrchestratorConfig,
    OrchestratorError, RunMode, RunReport,
};
pub use report::{render_error_report, write_error_report};
pub use submission::{parse_submission_file, parse_submission_str, SubmissionError};
