//! Fixed pool of download workers sharing one queue of ready jobs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::archive::{FileTransfer, TransferError};
use crate::job::{Job, Product, ProductLocation};
use crate::message;

use super::registry::JobRegistry;
use super::results::ResultSink;
use super::status::StatusSink;

/// Items on the download queue.
#[derive(Debug)]
pub enum DownloadItem {
    Job(Box<Job>),
    /// Stops the one worker that pulls it.
    Stop,
}

/// Producer side of the download queue.
#[derive(Clone)]
pub struct DownloadQueue {
    tx: mpsc::UnboundedSender<DownloadItem>,
}

impl DownloadQueue {
    pub fn enqueue(&self, job: Job) {
        if self.tx.send(DownloadItem::Job(Box::new(job))).is_err() {
            warn!("Download queue closed; dropping ready job");
        }
    }

    fn stop_one(&self) {
        let _ = self.tx.send(DownloadItem::Stop);
    }
}

/// Consumer side of the download queue, shared by every worker.
pub struct DownloadReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<DownloadItem>>>,
}

#[cfg(test)]
impl DownloadReceiver {
    pub(crate) fn into_inner(self) -> mpsc::UnboundedReceiver<DownloadItem> {
        match Arc::try_unwrap(self.rx) {
            Ok(rx) => rx.into_inner(),
            Err(_) => panic!("download receiver is shared"),
        }
    }
}

/// Create the download queue. Jobs may be enqueued before any worker starts.
pub fn download_queue() -> (DownloadQueue, DownloadReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DownloadQueue { tx },
        DownloadReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Everything a worker needs to process a ready job.
pub struct WorkerContext {
    pub registry: Arc<JobRegistry>,
    pub transfer: Arc<dyn FileTransfer>,
    pub status: StatusSink,
    pub results: ResultSink,
    pub output_dir: PathBuf,
}

/// Local path for a remote product: the last segment of its URL under `output_dir`.
pub fn destination_for(output_dir: &Path, url: &reqwest::Url) -> Option<PathBuf> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(|name| output_dir.join(name))
}

impl WorkerContext {
    /// Process every product of `job`, then stop tracking it.
    ///
    /// A failed product is recorded as a result and does not stop its siblings.
    async fn download_job(&self, job: &Job) {
        info!("Processing {} product(s) for job {}", job.products.len(), job.id);

        for product in &job.products {
            if let Err(e) = self.download_product(job, product).await {
                warn!("Download of {} for job {} failed: {}", product.locator, job.id, e);
                self.results.record(
                    job.id,
                    job.obs_id,
                    &message::download_failed(job.id, &product.locator, &e),
                );
            }
        }

        self.registry.remove(job.id);
    }

    async fn download_product(&self, job: &Job, product: &Product) -> Result<(), TransferError> {
        let url = match product.location() {
            ProductLocation::SharedStorage => {
                self.status
                    .emit(message::on_shared_storage(job.id, &product.locator));
                return Ok(());
            }
            ProductLocation::Remote(url) => url,
        };

        let destination = destination_for(&self.output_dir, &url)
            .ok_or_else(|| TransferError::InvalidLocator(product.locator.clone()))?;
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| product.locator.clone());

        if already_downloaded(&destination, product.size_bytes).await {
            debug!("{} already present with expected size", destination.display());
            self.status.emit(message::download_complete(
                job.id,
                &file_name,
                product.content_hash.as_deref(),
            ));
            return Ok(());
        }

        self.status
            .emit(message::downloading(job.id, &file_name, product.size_bytes));
        let written = self.transfer.fetch(&url, &destination).await?;
        debug!("Wrote {} bytes to {}", written, destination.display());
        self.status.emit(message::download_complete(
            job.id,
            &file_name,
            product.content_hash.as_deref(),
        ));
        Ok(())
    }
}

async fn already_downloaded(path: &Path, size_bytes: u64) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() == size_bytes,
        Err(_) => false,
    }
}

async fn run_worker(
    index: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<DownloadItem>>>,
    ctx: Arc<WorkerContext>,
) {
    debug!("Download worker {} started", index);
    loop {
        // Only one worker waits on the queue at a time; the lock is released
        // before the download starts.
        let item = rx.lock().await.recv().await;
        match item {
            Some(DownloadItem::Job(job)) => ctx.download_job(&job).await,
            Some(DownloadItem::Stop) | None => break,
        }
    }
    debug!("Download worker {} stopped", index);
}

/// Running worker pool.
pub struct DownloadDispatcher {
    queue: DownloadQueue,
    workers: Vec<JoinHandle<()>>,
}

impl DownloadDispatcher {
    /// Start `workers` download workers (at least one) on `receiver`.
    pub fn start(
        workers: usize,
        queue: DownloadQueue,
        receiver: DownloadReceiver,
        ctx: Arc<WorkerContext>,
    ) -> Self {
        let count = workers.max(1);
        info!("Starting {} download workers", count);

        let workers = (0..count)
            .map(|index| {
                let rx = Arc::clone(&receiver.rx);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(run_worker(index, rx, ctx))
            })
            .collect();

        Self { queue, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue exactly one stop per worker and wait for all of them.
    ///
    /// Jobs queued before the stops are still processed.
    pub async fn shutdown(self) {
        for _ in 0..self.workers.len() {
            self.queue.stop_one();
        }
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!("Download worker task failed: {}", e);
            }
        }
        info!("Download workers stopped");
    }
}
