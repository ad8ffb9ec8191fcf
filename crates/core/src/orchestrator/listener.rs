//! Event listener: routes job state changes for tracked jobs.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::archive::EventChannel;
use crate::job::{Event, EventAction, JobState};
use crate::message;

use super::dispatcher::DownloadQueue;
use super::registry::JobRegistry;
use super::results::ResultSink;
use super::status::StatusSink;

/// Everything the listener touches while handling an event.
pub struct ListenerContext {
    pub registry: Arc<JobRegistry>,
    pub downloads: DownloadQueue,
    pub status: StatusSink,
    pub results: ResultSink,
    pub verbose: bool,
}

impl ListenerContext {
    /// Apply one event. The membership test and any registry change happen
    /// under a single registry lock.
    pub fn handle_event(&self, event: Event) {
        let job = event.job;
        let line = message::job_status(event.action, &job, self.verbose);
        let mut registry = self.registry.lock();

        if event.action == EventAction::Delete {
            self.status.emit(line);
            registry.remove(job.id);
            return;
        }

        if !registry.contains(job.id) {
            debug!("Ignoring event for untracked job {}", job.id);
            return;
        }

        match job.state {
            JobState::Queued | JobState::Processing => self.status.emit(line),
            JobState::ReadyForDownload => {
                self.status.emit(line);
                // Stays tracked until a worker has handled its products
                self.downloads.enqueue(job);
            }
            JobState::Error | JobState::Expired => {
                self.results.record(job.id, job.obs_id, &line);
                registry.remove(job.id);
            }
            JobState::Cancelled => {
                self.status.emit(line);
                registry.remove(job.id);
            }
        }
    }
}

/// Running listener task.
pub struct EventListener {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl EventListener {
    /// Spawn the listener on `channel`.
    ///
    /// When the channel closes on its own the listener queues
    /// [`ResultMessage::ConnectionLost`](super::ResultMessage::ConnectionLost) and exits.
    pub fn start(channel: Box<dyn EventChannel>, ctx: ListenerContext) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(listen(channel, ctx, shutdown_rx));
        Self { handle, shutdown }
    }

    /// Close the channel from our side and wait for the task to finish.
    pub async fn close(self) {
        // The task may already have exited after losing the channel
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            warn!("Event listener task failed: {}", e);
        }
    }
}

async fn listen(
    mut channel: Box<dyn EventChannel>,
    ctx: ListenerContext,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!("Event listener started");
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Event listener received shutdown signal");
                channel.close().await;
                break;
            }
            event = channel.receive() => match event {
                Some(event) => ctx.handle_event(event),
                None => {
                    warn!("Event channel closed");
                    ctx.results.connection_lost();
                    break;
                }
            },
        }
    }
    info!("Event listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::dispatcher::{download_queue, DownloadItem};
    use crate::orchestrator::results::{result_channel, ResultAggregator, ResultMessage};
    use crate::orchestrator::status::status_channel;
    use crate::testing::{fixtures, MockArchive, SharedBuffer};
    use crate::archive::ArchiveConnector;
    use std::time::Duration;

    struct Harness {
        ctx: ListenerContext,
        registry: Arc<JobRegistry>,
        aggregator: ResultAggregator,
        downloads: tokio::sync::mpsc::UnboundedReceiver<DownloadItem>,
        output: SharedBuffer,
        writer: Option<crate::orchestrator::status::StatusWriter<SharedBuffer>>,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(JobRegistry::new());
            let output = SharedBuffer::new();
            let (status, writer) = status_channel(output.clone(), false);
            let (results, aggregator) = result_channel(false);
            let (queue, receiver) = download_queue();
            Self {
                ctx: ListenerContext {
                    registry: Arc::clone(&registry),
                    downloads: queue,
                    status,
                    results,
                    verbose: false,
                },
                registry,
                aggregator,
                downloads: receiver.into_inner(),
                output,
                writer: Some(writer),
            }
        }

        async fn flush_status(&mut self) -> String {
            self.ctx.status.shutdown();
            if let Some(writer) = self.writer.take() {
                writer.run().await;
            }
            self.output.contents()
        }

        fn queued_downloads(&mut self) -> usize {
            let mut count = 0;
            while let Ok(item) = self.downloads.try_recv() {
                if matches!(item, DownloadItem::Job(_)) {
                    count += 1;
                }
            }
            count
        }
    }

    #[tokio::test]
    async fn test_progress_events_only_emit_status() {
        let mut harness = Harness::new();
        harness.registry.add(55);

        harness
            .ctx
            .handle_event(Event::upsert(fixtures::job(55, 1000, JobState::Queued)));
        harness
            .ctx
            .handle_event(Event::upsert(fixtures::job(55, 1000, JobState::Processing)));

        assert!(harness.registry.contains(55));
        assert_eq!(harness.queued_downloads(), 0);
        let output = harness.flush_status().await;
        assert!(output.contains("Queued: Job id: 55 Obs id: 1000"));
        assert!(output.contains("Processing: Job id: 55"));
    }

    #[tokio::test]
    async fn test_ready_event_enqueues_and_keeps_tracking() {
        let mut harness = Harness::new();
        harness.registry.add(55);

        let job = fixtures::ready_job(55, 1000, vec![fixtures::product("http://host/f.tar", 1024)]);
        harness.ctx.handle_event(Event::upsert(job));

        assert!(harness.registry.contains(55));
        assert_eq!(harness.queued_downloads(), 1);
        let output = harness.flush_status().await;
        assert!(output.contains("Ready for Download: Job id: 55"));
        assert!(output.contains("size: 1024 bytes"));
    }

    #[tokio::test]
    async fn test_ready_event_for_untracked_job_is_ignored() {
        let mut harness = Harness::new();
        harness.registry.add(55);

        let job = fixtures::ready_job(99, 1, vec![fixtures::product("http://host/x.tar", 1)]);
        harness.ctx.handle_event(Event::upsert(job));

        assert_eq!(harness.queued_downloads(), 0);
        assert!(harness.registry.contains(55));
        assert!(harness.flush_status().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_never_routes_to_downloads() {
        let mut harness = Harness::new();
        harness.registry.add(55);

        let job = fixtures::ready_job(55, 1000, vec![fixtures::product("http://host/f.tar", 1024)]);
        harness.ctx.handle_event(Event::delete(job));

        assert_eq!(harness.queued_downloads(), 0);
        assert!(harness.registry.is_empty());
        assert!(harness.flush_status().await.contains("Deleted: Job id: 55"));
    }

    #[tokio::test]
    async fn test_error_and_expired_become_results() {
        let mut harness = Harness::new();
        harness.registry.add(55);
        harness.registry.add(56);

        harness
            .ctx
            .handle_event(Event::upsert(fixtures::failed_job(55, 1000, "disk full")));
        harness
            .ctx
            .handle_event(Event::upsert(fixtures::job(56, 1001, JobState::Expired)));

        assert!(harness.registry.is_empty());
        let results = harness.aggregator.drain();
        assert_eq!(results.len(), 2);
        match &results[0] {
            ResultMessage::Failure(r) => {
                assert_eq!(r.job_id, 55);
                assert_eq!(r.obs_id, Some(1000));
                assert!(r.plain.starts_with("Error: disk full; Job id: 55"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &results[1] {
            ResultMessage::Failure(r) => assert!(r.plain.starts_with("Expired: Job id: 56")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_is_not_an_error() {
        let mut harness = Harness::new();
        harness.registry.add(55);

        harness
            .ctx
            .handle_event(Event::upsert(fixtures::job(55, 1000, JobState::Cancelled)));

        assert!(harness.registry.is_empty());
        assert!(harness.aggregator.drain().is_empty());
        assert!(harness.flush_status().await.contains("Cancelled: Job id: 55"));
    }

    #[tokio::test]
    async fn test_channel_loss_reports_connection_lost() {
        let archive = MockArchive::new();
        let feed = archive.event_feed();
        let channel = archive.connect_events().await.unwrap();

        let mut harness = Harness::new();
        let ctx = std::mem::replace(&mut harness.ctx, Harness::new().ctx);
        let listener = EventListener::start(channel, ctx);

        feed.close();
        assert_eq!(
            harness.aggregator.next(Duration::from_secs(5)).await,
            Some(ResultMessage::ConnectionLost)
        );
        listener.close().await;
        assert!(!archive.closed_by_client().await);
    }

    #[tokio::test]
    async fn test_voluntary_close_does_not_report_loss() {
        let archive = MockArchive::new();
        let _feed = archive.event_feed();
        let channel = archive.connect_events().await.unwrap();

        let mut harness = Harness::new();
        let ctx = std::mem::replace(&mut harness.ctx, Harness::new().ctx);
        let listener = EventListener::start(channel, ctx);
        listener.close().await;

        assert!(harness.aggregator.drain().is_empty());
        assert!(archive.closed_by_client().await);
    }
}
