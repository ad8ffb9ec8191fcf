//! Terminal job outcomes and the queue collecting them.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::job::{JobId, ObsId};
use crate::message::Styled;

/// Reportable outcome for a job that ended abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub obs_id: Option<ObsId>,
    /// Message as shown on a terminal (may contain ANSI colour).
    pub rendered: String,
    /// Same message without styling, for the error report.
    pub plain: String,
}

impl JobResult {
    pub fn new(job_id: JobId, obs_id: Option<ObsId>, message: &Styled, color: bool) -> Self {
        Self {
            job_id,
            obs_id,
            rendered: message.render(color),
            plain: message.plain_text(),
        }
    }
}

/// Items carried by the result queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultMessage {
    Failure(JobResult),
    /// The event channel closed; the run cannot make progress.
    ConnectionLost,
}

/// Producer side of the result queue.
#[derive(Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<ResultMessage>,
    color: bool,
}

impl ResultSink {
    /// Record a failure for `job_id`.
    pub fn record(&self, job_id: JobId, obs_id: Option<ObsId>, message: &Styled) {
        self.send(ResultMessage::Failure(JobResult::new(
            job_id, obs_id, message, self.color,
        )));
    }

    pub fn connection_lost(&self) {
        self.send(ResultMessage::ConnectionLost);
    }

    fn send(&self, message: ResultMessage) {
        if self.tx.send(message).is_err() {
            tracing::warn!("Result queue closed; dropping result");
        }
    }
}

/// Consumer side of the result queue.
pub struct ResultAggregator {
    rx: mpsc::UnboundedReceiver<ResultMessage>,
}

impl ResultAggregator {
    /// Wait up to `timeout` for the next message.
    ///
    /// `None` means nothing arrived in time. It never means the connection was
    /// lost; that is [`ResultMessage::ConnectionLost`].
    pub async fn next(&mut self, timeout: Duration) -> Option<ResultMessage> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Some(message),
            Ok(None) => {
                // Every producer is gone; keep the caller's polling cadence.
                tokio::time::sleep(timeout).await;
                None
            }
            Err(_) => None,
        }
    }

    /// Take everything already queued without waiting.
    pub fn drain(&mut self) -> Vec<ResultMessage> {
        let mut messages = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }
}

/// Create a connected result sink and aggregator.
pub fn result_channel(color: bool) -> (ResultSink, ResultAggregator) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResultSink { tx, color }, ResultAggregator { rx })
}
