//! JSON frame format shared by the event push channel and the job listing.
//!
//! ```json
//! {"action": "UPDATE",
//!  "row": {"id": 55, "job_state": 2, "job_type": 0,
//!          "job_params": {"obs_id": "1000"}, "error_text": null,
//!          "product": {"files": [["https://host/f.tar", 1024, "abc123"]]}}}
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::types::{Event, EventAction, Job, JobDecodeError, JobState, JobType, Product};

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    action: Option<String>,
    row: WireJob,
}

#[derive(Debug, Deserialize)]
struct WireJob {
    id: u64,
    job_state: i64,
    job_type: i64,
    #[serde(default)]
    job_params: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    error_text: Option<String>,
    #[serde(default)]
    product: Option<WireProducts>,
}

#[derive(Debug, Deserialize)]
struct WireProducts {
    #[serde(default)]
    files: Option<Vec<WireFile>>,
}

/// Sizes arrive as numbers or as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSize {
    Number(u64),
    Text(String),
}

impl WireSize {
    fn bytes(self) -> Result<u64, JobDecodeError> {
        match self {
            WireSize::Number(n) => Ok(n),
            WireSize::Text(s) => match s.trim().parse() {
                Ok(n) => Ok(n),
                Err(_) => Err(JobDecodeError::InvalidSize(s)),
            },
        }
    }
}

/// A product entry is a positional array; older jobs have no hash.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireFile {
    Hashed(String, WireSize, Option<String>),
    Plain(String, WireSize),
}

impl TryFrom<WireFile> for Product {
    type Error = JobDecodeError;

    fn try_from(file: WireFile) -> Result<Self, Self::Error> {
        let (locator, size, content_hash) = match file {
            WireFile::Hashed(locator, size, content_hash) => (locator, size, content_hash),
            WireFile::Plain(locator, size) => (locator, size, None),
        };
        Ok(Product {
            locator,
            size_bytes: size.bytes()?,
            content_hash,
        })
    }
}

fn param_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl TryFrom<WireJob> for Job {
    type Error = JobDecodeError;

    fn try_from(row: WireJob) -> Result<Self, Self::Error> {
        let state = JobState::from_code(row.job_state)?;
        let job_type = JobType::from_code(row.job_type)?;
        let params: BTreeMap<String, String> = row
            .job_params
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, param_to_string(v)))
            .collect();
        let obs_id = params.get("obs_id").and_then(|v| v.trim().parse().ok());
        let products = row
            .product
            .and_then(|p| p.files)
            .unwrap_or_default()
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Job {
            id: row.id,
            obs_id,
            job_type,
            state,
            params,
            products,
            error_text: row.error_text,
        })
    }
}

fn parse_action(action: Option<&str>) -> EventAction {
    match action {
        Some(a) if a.eq_ignore_ascii_case("DELETE") => EventAction::Delete,
        _ => EventAction::Upsert,
    }
}

/// Decode one push-channel frame.
pub fn decode_event(frame: &str) -> Result<Event, JobDecodeError> {
    let wire: WireFrame = serde_json::from_str(frame)?;
    let action = parse_action(wire.action.as_deref());
    Ok(Event {
        action,
        job: Job::try_from(wire.row)?,
    })
}

/// Decode one entry of the job listing (same shape as an event frame).
pub fn decode_snapshot(entry: &str) -> Result<Job, JobDecodeError> {
    let wire: WireFrame = serde_json::from_str(entry)?;
    Job::try_from(wire.row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ready_event() {
        let frame = r#"{"action":"UPDATE","row":{"id":55,"job_state":2,"job_type":0,
            "job_params":{"obs_id":"1000","timeres":"2"},"error_text":null,
            "product":{"files":[["http://host/f.tar",1024,"abc123"]]}}}"#;
        let event = decode_event(frame).unwrap();

        assert_eq!(event.action, EventAction::Upsert);
        assert_eq!(event.job.id, 55);
        assert_eq!(event.job.obs_id, Some(1000));
        assert_eq!(event.job.state, JobState::ReadyForDownload);
        assert_eq!(event.job.job_type, JobType::Conversion);
        assert_eq!(event.job.products.len(), 1);
        assert_eq!(event.job.products[0].size_bytes, 1024);
        assert_eq!(
            event.job.products[0].content_hash.as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_decode_delete_event() {
        let frame = r#"{"action":"DELETE","row":{"id":7,"job_state":1,"job_type":1,
            "job_params":{"obs_id":1234}}}"#;
        let event = decode_event(frame).unwrap();

        assert_eq!(event.action, EventAction::Delete);
        // Numeric params are normalised to strings
        assert_eq!(event.job.params.get("obs_id").map(String::as_str), Some("1234"));
        assert_eq!(event.job.obs_id, Some(1234));
        assert!(event.job.products.is_empty());
    }

    #[test]
    fn test_decode_products_without_hash() {
        let frame = r#"{"action":"INSERT","row":{"id":1,"job_state":2,"job_type":1,
            "job_params":{"obs_id":"5"},
            "product":{"files":[["a.tar",10],["b.tar",20,null]]}}}"#;
        let job = decode_event(frame).unwrap().job;

        assert_eq!(job.products.len(), 2);
        assert!(job.products.iter().all(|p| p.content_hash.is_none()));
        assert_eq!(job.total_size(), 30);
    }

    #[test]
    fn test_decode_error_text() {
        let frame = r#"{"action":"UPDATE","row":{"id":55,"job_state":3,"job_type":0,
            "job_params":{"obs_id":"1000"},"error_text":"disk full","product":null}}"#;
        let job = decode_event(frame).unwrap().job;

        assert_eq!(job.state, JobState::Error);
        assert_eq!(job.error_text.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_decode_null_params_and_files() {
        let frame = r#"{"action":"DELETE","row":{"id":55,"job_state":3,"job_type":0,
            "job_params":null}}"#;
        let event = decode_event(frame).unwrap();
        assert_eq!(event.action, EventAction::Delete);
        assert_eq!(event.job.id, 55);
        assert!(event.job.params.is_empty());
        assert_eq!(event.job.obs_id, None);

        let frame = r#"{"action":"UPDATE","row":{"id":56,"job_state":2,"job_type":0,
            "job_params":{"obs_id":"1000"},"product":{"files":null}}}"#;
        let job = decode_event(frame).unwrap().job;
        assert_eq!(job.state, JobState::ReadyForDownload);
        assert!(job.products.is_empty());
    }

    #[test]
    fn test_decode_string_sizes() {
        let frame = r#"{"action":"UPDATE","row":{"id":55,"job_state":2,"job_type":0,
            "job_params":{"obs_id":"1000"},
            "product":{"files":[["http://h/f.tar","1024","abc"],["http://h/g.tar"," 8 "]]}}}"#;
        let job = decode_event(frame).unwrap().job;

        assert_eq!(job.products[0].size_bytes, 1024);
        assert_eq!(job.products[0].content_hash.as_deref(), Some("abc"));
        assert_eq!(job.products[1].size_bytes, 8);
        assert_eq!(job.total_size(), 1032);
    }

    #[test]
    fn test_decode_non_numeric_size() {
        let frame = r#"{"action":"UPDATE","row":{"id":55,"job_state":2,"job_type":0,
            "product":{"files":[["http://h/f.tar","big"]]}}}"#;
        assert!(matches!(
            decode_event(frame),
            Err(JobDecodeError::InvalidSize(ref s)) if s == "big"
        ));
    }

    #[test]
    fn test_decode_unknown_state() {
        let frame = r#"{"action":"UPDATE","row":{"id":1,"job_state":42,"job_type":0}}"#;
        assert!(matches!(
            decode_event(frame),
            Err(JobDecodeError::UnknownState(42))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_event("not json"), Err(JobDecodeError::Json(_))));
    }

    #[test]
    fn test_decode_snapshot_without_action() {
        let entry = r#"{"row":{"id":9,"job_state":0,"job_type":2,"job_params":{}}}"#;
        let job = decode_snapshot(entry).unwrap();

        assert_eq!(job.id, 9);
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.obs_id, None);
    }
}
