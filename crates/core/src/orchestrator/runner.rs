//! Run lifecycle.
//!
//! Phases run strictly in order:
//! - Start: status writer, login, submission or listing depending on the mode
//! - Connect: event channel and listener (full mode only)
//! - Run: download workers, wait until no job is tracked or the channel is lost
//! - Shutdown: stop workers, close the listener, stop the status writer, drain results

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveConnector, Session};
use crate::job::{EventAction, JobRequest, JobState};
use crate::message;

use super::config::OrchestratorConfig;
use super::dispatcher::{download_queue, DownloadDispatcher, DownloadQueue, WorkerContext};
use super::listener::{EventListener, ListenerContext};
use super::registry::JobRegistry;
use super::results::{result_channel, JobResult, ResultAggregator, ResultMessage, ResultSink};
use super::status::{status_channel, StatusSink};
use super::types::{DownloadTarget, OrchestratorError, RunMode, RunReport};

/// Per-run shared state handed to every phase.
struct RunContext {
    registry: Arc<JobRegistry>,
    status: StatusSink,
    results: ResultSink,
}

/// Drives jobs from submission to download against one archive.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    connector: Arc<dyn ArchiveConnector>,
}

impl JobOrchestrator {
    pub fn new(config: OrchestratorConfig, connector: Arc<dyn ArchiveConnector>) -> Self {
        if config.download_workers == 0 {
            warn!("download_workers is 0; starting one worker");
        }
        Self { config, connector }
    }

    /// Execute `mode`, writing status lines to `out`.
    ///
    /// Returns the collected results once shutdown is complete. A lost event
    /// channel is reported as [`OrchestratorError::ConnectionLost`] after the
    /// shutdown sequence has run.
    pub async fn run<W>(&self, mode: RunMode, out: W) -> Result<RunReport, OrchestratorError>
    where
        W: Write + Send + 'static,
    {
        info!("Starting {} run", mode.name());

        let (status, writer) = status_channel(out, self.config.colorize);
        let status_task = tokio::spawn(writer.run());
        let (results, mut aggregator) = result_channel(self.config.colorize);
        let ctx = RunContext {
            registry: Arc::new(JobRegistry::new()),
            status,
            results,
        };

        let outcome = self.execute(mode, &ctx, &mut aggregator).await;

        ctx.status.shutdown();
        if let Err(e) = status_task.await {
            error!("Status writer task failed: {}", e);
        }

        let mut collected = outcome?;
        for message in aggregator.drain() {
            match message {
                ResultMessage::Failure(result) => collected.push(result),
                // The listener can still see the channel go while we close it
                ResultMessage::ConnectionLost => debug!("Ignoring channel loss after shutdown"),
            }
        }

        info!("Run finished with {} result(s)", collected.len());
        Ok(RunReport {
            results: collected,
            tracked: ctx.registry.additions(),
            released: ctx.registry.removals(),
        })
    }

    async fn execute(
        &self,
        mode: RunMode,
        ctx: &RunContext,
        aggregator: &mut ResultAggregator,
    ) -> Result<Vec<JobResult>, OrchestratorError> {
        ctx.status.emit_text("Connecting to MWA ASVO...");
        let session = self.connector.login().await?;
        ctx.status.emit_text("Connected to MWA ASVO");

        let (queue, receiver) = download_queue();

        let watch_events = match mode {
            RunMode::Full { requests } => {
                self.submit(&session, &requests, ctx).await?;
                true
            }
            RunMode::SubmitOnly { requests } => {
                self.submit(&session, &requests, ctx).await?;
                return Ok(Vec::new());
            }
            RunMode::ListOnly => {
                self.list(&session, ctx).await?;
                return Ok(Vec::new());
            }
            RunMode::Cancel { job_id } => {
                session.jobs.cancel_job(job_id).await?;
                ctx.status.emit(message::cancel_requested(job_id));
                return Ok(Vec::new());
            }
            RunMode::DownloadOnly { target } => {
                if !self.enqueue_downloads(&session, target, &queue, ctx).await? {
                    return Ok(Vec::new());
                }
                false
            }
        };

        let listener = if watch_events {
            ctx.status.emit_text("Connecting to MWA ASVO Notifier...");
            let channel = self.connector.connect_events().await?;
            ctx.status.emit_text("Connected to MWA ASVO Notifier");
            Some(EventListener::start(
                channel,
                ListenerContext {
                    registry: Arc::clone(&ctx.registry),
                    downloads: queue.clone(),
                    status: ctx.status.clone(),
                    results: ctx.results.clone(),
                    verbose: self.config.verbose,
                },
            ))
        } else {
            None
        };

        let dispatcher = DownloadDispatcher::start(
            self.config.download_workers,
            queue,
            receiver,
            Arc::new(WorkerContext {
                registry: Arc::clone(&ctx.registry),
                transfer: Arc::clone(&session.transfer),
                status: ctx.status.clone(),
                results: ctx.results.clone(),
                output_dir: self.config.output_dir.clone(),
            }),
        );

        let mut collected = Vec::new();
        let waited = self
            .wait_for_jobs(&ctx.registry, aggregator, &mut collected)
            .await;

        info!("Shutting down");
        dispatcher.shutdown().await;
        if let Some(listener) = listener {
            listener.close().await;
        }

        waited.map(|_| collected)
    }

    /// Block until no job is tracked, collecting results on the way.
    async fn wait_for_jobs(
        &self,
        registry: &JobRegistry,
        aggregator: &mut ResultAggregator,
        collected: &mut Vec<JobResult>,
    ) -> Result<(), OrchestratorError> {
        let poll = Duration::from_millis(self.config.result_poll_interval_ms.max(1));
        loop {
            if registry.is_empty() {
                debug!("No jobs left to track");
                return Ok(());
            }
            match aggregator.next(poll).await {
                Some(ResultMessage::Failure(result)) => collected.push(result),
                Some(ResultMessage::ConnectionLost) => {
                    error!(
                        "Event channel lost with {} job(s) outstanding",
                        registry.len()
                    );
                    return Err(OrchestratorError::ConnectionLost);
                }
                None => continue,
            }
        }
    }

    /// Submit every request and track the returned ids.
    ///
    /// Rejected submissions are reported and skipped.
    async fn submit(
        &self,
        session: &Session,
        requests: &[JobRequest],
        ctx: &RunContext,
    ) -> Result<(), OrchestratorError> {
        let existing: HashSet<_> = session
            .jobs
            .list_jobs()
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect();

        for (position, request) in requests.iter().enumerate() {
            let index = position + 1;
            match session.jobs.submit_job(request).await {
                Ok(job_id) => {
                    if existing.contains(&job_id) {
                        ctx.status.emit(message::already_exists(job_id));
                    } else {
                        ctx.status.emit(message::submitted(job_id));
                    }
                    ctx.registry.add(job_id);
                }
                Err(e) if e.is_rejection() => {
                    warn!("Submission #{} rejected: {}", index, e);
                    ctx.status
                        .emit(message::submission_skipped(index, &e.to_string()));
                }
                Err(e) => return Err(OrchestratorError::Submission { index, source: e }),
            }
        }

        info!("Tracking {} submitted job(s)", ctx.registry.len());
        Ok(())
    }

    async fn list(&self, session: &Session, ctx: &RunContext) -> Result<(), OrchestratorError> {
        let jobs = session.jobs.list_jobs().await?;
        if jobs.is_empty() {
            ctx.status.emit_text("You have no jobs.");
        }
        for job in &jobs {
            ctx.status
                .emit(message::job_status(EventAction::Upsert, job, self.config.verbose));
        }
        Ok(())
    }

    /// Queue the jobs a download-only run asked for.
    ///
    /// Returns false when there is nothing to do. An unknown or unready job is
    /// recorded as a result and never tracked.
    async fn enqueue_downloads(
        &self,
        session: &Session,
        target: DownloadTarget,
        queue: &DownloadQueue,
        ctx: &RunContext,
    ) -> Result<bool, OrchestratorError> {
        let jobs = session.jobs.list_jobs().await?;

        match target {
            DownloadTarget::AllReady => {
                let ready: Vec<_> = jobs
                    .into_iter()
                    .filter(|job| job.state == JobState::ReadyForDownload)
                    .collect();
                if ready.is_empty() {
                    ctx.status
                        .emit_text("You have no jobs that are ready to download.");
                    return Ok(false);
                }
                for job in ready {
                    ctx.status
                        .emit(message::job_status(EventAction::Upsert, &job, self.config.verbose));
                    ctx.registry.add(job.id);
                    queue.enqueue(job);
                }
            }
            DownloadTarget::Job(job_id) => match jobs.into_iter().find(|job| job.id == job_id) {
                None => {
                    ctx.results
                        .record(job_id, None, &message::not_a_valid_job(job_id));
                }
                Some(job) if job.state != JobState::ReadyForDownload => {
                    ctx.results
                        .record(job.id, job.obs_id, &message::not_ready_for_download(&job));
                }
                Some(job) => {
                    ctx.registry.add(job.id);
                    queue.enqueue(job);
                }
            },
        }
        Ok(true)
    }
}
