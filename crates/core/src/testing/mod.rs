//! Testing utilities and mock implementations.
//!
//! This module provides a mock of the remote archive (job service, file
//! transfer and event channel) so the orchestrator can be driven end to end
//! without a server.
//!
//! # Example
//!
//! ```rust,ignore
//! use asvo_core::testing::{fixtures, MockArchive, SharedBuffer};
//!
//! let archive = MockArchive::new();
//! archive.set_next_job_id(55).await;
//! archive.event_feed().send(Event::upsert(fixtures::job(55, 1000, JobState::Processing)));
//!
//! let output = SharedBuffer::new();
//! let report = orchestrator.run(mode, output.clone()).await?;
//! assert!(output.contents().contains("Processing"));
//! ```

use std::io::Write;
use std::sync::Arc;

mod mock_archive;

pub use mock_archive::{EventFeed, MockArchive, RecordedFetch};

/// Cloneable in-memory writer for capturing status output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<parking_lot::Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(String::from).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::job::{
        ConversionParams, Job, JobId, JobRequest, JobState, JobType, ObsId, Product,
    };

    /// Conversion job snapshot in `state` with no products.
    pub fn job(id: JobId, obs_id: ObsId, state: JobState) -> Job {
        let mut params = BTreeMap::new();
        params.insert("obs_id".to_string(), obs_id.to_string());
        Job {
            id,
            obs_id: Some(obs_id),
            job_type: JobType::Conversion,
            state,
            params,
            products: Vec::new(),
            error_text: None,
        }
    }

    /// Job ready for download with the given products.
    pub fn ready_job(id: JobId, obs_id: ObsId, products: Vec<Product>) -> Job {
        Job {
            products,
            ..job(id, obs_id, JobState::ReadyForDownload)
        }
    }

    /// Job the server failed with `error_text`.
    pub fn failed_job(id: JobId, obs_id: ObsId, error_text: &str) -> Job {
        Job {
            error_text: Some(error_text.to_string()),
            ..job(id, obs_id, JobState::Error)
        }
    }

    /// Product with the content hash `abc123`.
    pub fn product(locator: &str, size_bytes: u64) -> Product {
        Product::new(locator, size_bytes).with_hash("abc123")
    }

    pub fn conversion_request(obs_id: ObsId) -> JobRequest {
        JobRequest::Conversion(ConversionParams {
            obs_id,
            options: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffer_clones_share_content() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writeln!(writer, "one").unwrap();
        writeln!(writer, "two").unwrap();
        assert_eq!(buffer.lines(), vec!["one", "two"]);
    }
}
