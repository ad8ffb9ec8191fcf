//! HTTP client for the ASVO job API.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::job::{decode_snapshot, Job, JobId, JobRequest};

use super::events::WsEventChannel;
use super::{
    ArchiveConnector, EventChannel, FileTransfer, JobService, ServiceError, Session,
    TransferError,
};

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: JobId,
}

fn map_request_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Connection(e.to_string())
    }
}

/// Turn a non-success response into `ServiceError::Rejected`, keeping the body.
async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Authenticated ASVO API client.
///
/// The session cookie set by `/api/login` lives in the cookie jar and is sent
/// with every later request, including artifact downloads.
#[derive(Clone)]
pub struct AsvoClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    request_timeout: Duration,
}

impl AsvoClient {
    /// Log in with HTTP basic auth and keep the session cookie.
    pub async fn login(config: &Config) -> Result<Self, ServiceError> {
        let base_url = Url::parse(&config.base_url())
            .map_err(|e| ServiceError::Connection(format!("invalid server address: {}", e)))?;
        let jar = Arc::new(Jar::default());
        let request_timeout = Duration::from_secs(config.timeout_secs as u64);

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .connect_timeout(request_timeout)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        let this = Self {
            client,
            jar,
            base_url,
            request_timeout,
        };

        let response = this
            .client
            .post(this.url("/api/login"))
            .basic_auth(&config.user, Some(&config.pass))
            .timeout(this.request_timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        check_status(response).await?;

        debug!("Logged in to {} as {}", this.base_url, config.user);
        Ok(this)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), endpoint)
    }

    /// `Cookie` header value for the current session, if the server set one.
    pub fn session_cookie(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|v| v.to_str().ok().map(String::from))
    }
}

/// Entries of `/api/get_jobs` are normally JSON-encoded strings, but accept
/// inline objects too.
fn decode_listing_entry(entry: Value) -> Option<Job> {
    let decoded = match entry {
        Value::String(s) => decode_snapshot(&s),
        other => decode_snapshot(&other.to_string()),
    };
    match decoded {
        Ok(job) => Some(job),
        Err(e) => {
            warn!("Skipping undecodable job listing entry: {}", e);
            None
        }
    }
}

#[async_trait]
impl JobService for AsvoClient {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobId, ServiceError> {
        let response = self
            .client
            .post(self.url(request.endpoint()))
            .form(&request.form())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response).await?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        debug!(
            "Submitted {} for obs {}: job {}",
            request.endpoint(),
            request.obs_id(),
            body.job_id
        );
        Ok(body.job_id)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ServiceError> {
        let response = self
            .client
            .get(self.url("/api/get_jobs"))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response).await?;

        let entries: Option<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        Ok(entries
            .unwrap_or_default()
            .into_iter()
            .filter_map(decode_listing_entry)
            .collect())
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(self.url("/api/cancel_job"))
            .form(&[("job_id", job_id.to_string())])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl FileTransfer for AsvoClient {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, TransferError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransferError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Http(status.as_u16()));
        }
        let expected = response.content_length();

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransferError::Request(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if expected != written {
                return Err(TransferError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        Ok(written)
    }
}

/// Connects to the ASVO API and its job-results websocket.
pub struct AsvoConnector {
    config: Config,
}

impl AsvoConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ArchiveConnector for AsvoConnector {
    async fn login(&self) -> Result<Session, ServiceError> {
        let client = Arc::new(AsvoClient::login(&self.config).await?);
        info!("Connected to {}", self.config.base_url());
        Ok(Session {
            jobs: client.clone(),
            transfer: client,
        })
    }

    /// The notifier authenticates with its own session.
    async fn connect_events(&self) -> Result<Box<dyn EventChannel>, ServiceError> {
        let client = AsvoClient::login(&self.config).await?;
        let cookie = client.session_cookie();
        if cookie.is_none() {
            warn!("Login did not set a session cookie; notifier may reject the connection");
        }
        let channel = WsEventChannel::connect(&self.config, cookie.as_deref()).await?;
        Ok(Box::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;

    #[test]
    fn test_decode_listing_entry_string() {
        let entry = Value::String(
            r#"{"row":{"id":3,"job_state":2,"job_type":1,"job_params":{"obs_id":"77"}}}"#
                .to_string(),
        );
        let job = decode_listing_entry(entry).unwrap();
        assert_eq!(job.id, 3);
        assert_eq!(job.state, JobState::ReadyForDownload);
        assert_eq!(job.obs_id, Some(77));
    }

    #[test]
    fn test_decode_listing_entry_object() {
        let entry = serde_json::json!({
            "row": {"id": 4, "job_state": 0, "job_type": 0, "job_params": {"obs_id": 1}}
        });
        assert_eq!(decode_listing_entry(entry).unwrap().id, 4);
    }

    #[test]
    fn test_decode_listing_entry_garbage_is_skipped() {
        assert!(decode_listing_entry(Value::String("nope".to_string())).is_none());
        assert!(decode_listing_entry(Value::Bool(true)).is_none());
    }

    #[test]
    fn test_submit_response() {
        let body: SubmitResponse = serde_json::from_str(r#"{"job_id": 55}"#).unwrap();
        assert_eq!(body.job_id, 55);
    }
}
