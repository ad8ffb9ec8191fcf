//! Mock archive for testing.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::archive::{
    ArchiveConnector, EventChannel, FileTransfer, JobService, ServiceError, Session,
    TransferError,
};
use crate::job::{Event, Job, JobId, JobRequest};

/// A recorded file transfer for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFetch {
    pub url: String,
    pub destination: PathBuf,
}

enum FeedItem {
    Event(Box<Event>),
    Close,
}

/// Test-side control of the mock event channel.
///
/// Events sent before the orchestrator connects are buffered and delivered
/// in order once it does.
#[derive(Clone)]
pub struct EventFeed {
    tx: mpsc::UnboundedSender<FeedItem>,
}

impl EventFeed {
    pub fn send(&self, event: Event) {
        let _ = self.tx.send(FeedItem::Event(Box::new(event)));
    }

    /// Close the channel from the server side.
    pub fn close(&self) {
        let _ = self.tx.send(FeedItem::Close);
    }
}

struct MockEventChannel {
    rx: mpsc::UnboundedReceiver<FeedItem>,
    closed: bool,
    closed_by_client: Arc<RwLock<bool>>,
}

#[async_trait]
impl EventChannel for MockEventChannel {
    async fn receive(&mut self) -> Option<Event> {
        if self.closed {
            return None;
        }
        match self.rx.recv().await {
            Some(FeedItem::Event(event)) => Some(*event),
            Some(FeedItem::Close) | None => {
                self.closed = true;
                None
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        *self.closed_by_client.write().await = true;
    }
}

/// Mock implementation of the archive traits.
///
/// Provides controllable behavior for testing:
/// - Job listing and server-assigned ids for submissions
/// - Scripted events through an [`EventFeed`]
/// - Served file payloads; any other URL fails with HTTP 404
/// - Recorded submissions, fetches and cancellations
///
/// # Example
///
/// ```rust,ignore
/// let archive = MockArchive::new();
/// archive.set_next_job_id(55).await;
/// archive.serve("http://host/f.tar", 1024).await;
///
/// let feed = archive.event_feed();
/// feed.send(Event::upsert(fixtures::ready_job(55, 1000, vec![...])));
///
/// let orchestrator = JobOrchestrator::new(config, Arc::new(archive.clone()));
/// ```
#[derive(Clone)]
pub struct MockArchive {
    /// Jobs returned by `list_jobs`.
    jobs: Arc<RwLock<Vec<Job>>>,
    /// Id handed to the next accepted submission.
    next_job_id: Arc<RwLock<JobId>>,
    /// Scripted submission outcomes, used before falling back to `next_job_id`.
    submit_script: Arc<RwLock<VecDeque<Result<JobId, ServiceError>>>>,
    submissions: Arc<RwLock<Vec<JobRequest>>>,
    cancelled: Arc<RwLock<Vec<JobId>>>,
    /// Payload sizes by URL.
    served: Arc<RwLock<HashMap<String, u64>>>,
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    /// If set, the next login fails with this error.
    login_error: Arc<RwLock<Option<ServiceError>>>,
    feed: EventFeed,
    feed_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<FeedItem>>>>,
    closed_by_client: Arc<RwLock<bool>>,
}

impl Default for MockArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArchive {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            next_job_id: Arc::new(RwLock::new(1)),
            submit_script: Arc::new(RwLock::new(VecDeque::new())),
            submissions: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
            served: Arc::new(RwLock::new(HashMap::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
            login_error: Arc::new(RwLock::new(None)),
            feed: EventFeed { tx },
            feed_rx: Arc::new(Mutex::new(Some(rx))),
            closed_by_client: Arc::new(RwLock::new(false)),
        }
    }

    /// Add a job to the listing.
    pub async fn add_job(&self, job: Job) {
        self.jobs.write().await.push(job);
    }

    /// Id assigned to the next submission without a scripted outcome.
    /// Later submissions count up from it.
    pub async fn set_next_job_id(&self, job_id: JobId) {
        *self.next_job_id.write().await = job_id;
    }

    /// Queue the outcome of the next submission.
    pub async fn script_submission(&self, outcome: Result<JobId, ServiceError>) {
        self.submit_script.write().await.push_back(outcome);
    }

    /// Serve `size` bytes at `url`.
    pub async fn serve(&self, url: &str, size: u64) {
        self.served.write().await.insert(url.to_string(), size);
    }

    pub async fn fail_next_login(&self, error: ServiceError) {
        *self.login_error.write().await = Some(error);
    }

    pub fn event_feed(&self) -> EventFeed {
        self.feed.clone()
    }

    pub async fn submissions(&self) -> Vec<JobRequest> {
        self.submissions.read().await.clone()
    }

    pub async fn cancelled(&self) -> Vec<JobId> {
        self.cancelled.read().await.clone()
    }

    pub async fn fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Whether the client closed the event channel itself.
    pub async fn closed_by_client(&self) -> bool {
        *self.closed_by_client.read().await
    }
}

#[async_trait]
impl JobService for MockArchive {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobId, ServiceError> {
        self.submissions.write().await.push(request.clone());

        if let Some(outcome) = self.submit_script.write().await.pop_front() {
            return outcome;
        }

        let mut next = self.next_job_id.write().await;
        let job_id = *next;
        *next += 1;
        Ok(job_id)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ServiceError> {
        Ok(self.jobs.read().await.clone())
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<(), ServiceError> {
        let known = self.jobs.read().await.iter().any(|job| job.id == job_id);
        if !known {
            return Err(ServiceError::Rejected {
                status: 400,
                body: format!("job {} not found", job_id),
            });
        }
        self.cancelled.write().await.push(job_id);
        Ok(())
    }
}

#[async_trait]
impl FileTransfer for MockArchive {
    async fn fetch(&self, url: &reqwest::Url, destination: &Path) -> Result<u64, TransferError> {
        self.fetches.write().await.push(RecordedFetch {
            url: url.to_string(),
            destination: destination.to_path_buf(),
        });

        let size = self
            .served
            .read()
            .await
            .get(url.as_str())
            .copied()
            .ok_or(TransferError::Http(404))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, vec![0u8; size as usize]).await?;
        Ok(size)
    }
}

#[async_trait]
impl ArchiveConnector for MockArchive {
    async fn login(&self) -> Result<Session, ServiceError> {
        if let Some(error) = self.login_error.write().await.take() {
            return Err(error);
        }
        Ok(Session {
            jobs: Arc::new(self.clone()),
            transfer: Arc::new(self.clone()),
        })
    }

    async fn connect_events(&self) -> Result<Box<dyn EventChannel>, ServiceError> {
        let rx = self
            .feed_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ServiceError::Channel("event channel already connected".to_string()))?;
        Ok(Box::new(MockEventChannel {
            rx,
            closed: false,
            closed_by_client: Arc::clone(&self.closed_by_client),
        }))
    }
}
