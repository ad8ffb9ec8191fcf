//! Submission file parsing.
//!
//! One job per line, as comma-separated `key=value` cells:
//!
//! ```text
//! # conversion of one observation
//! obs_id=1110103576, job_type=c, timeres=4, freqres=40, conversion=ms
//! obs_id=1110103576, job_type=d, download_type=vis_meta
//! obs_id=1110103576, job_type=v, offset=0, duration=8
//! ```
//!
//! Spaces inside cells are ignored. Blank lines and lines whose first cell
//! starts with `#` are skipped.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::job::{ConversionParams, DownloadParams, JobRequest, ObsId, VoltageParams};

/// Problems with the submission file.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// A row could not be turned into a job. `line` is 1-based.
    #[error("Error: {message}, Line num: {line}")]
    Row { line: usize, message: String },

    #[error("Error: cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error: No jobs to submit")]
    Empty,
}

impl SubmissionError {
    pub fn row(line: usize, message: impl Into<String>) -> Self {
        SubmissionError::Row {
            line,
            message: message.into(),
        }
    }

    /// Line of the offending row, when the error is about one.
    pub fn line(&self) -> Option<usize> {
        match self {
            SubmissionError::Row { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Read and parse a submission file. A file with no jobs is an error.
pub fn parse_submission_file(path: &Path) -> Result<Vec<JobRequest>, SubmissionError> {
    let content = std::fs::read_to_string(path).map_err(|source| SubmissionError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let requests = parse_submission_str(&content)?;
    if requests.is_empty() {
        return Err(SubmissionError::Empty);
    }
    Ok(requests)
}

/// Parse submission text. Returns an empty list if every line is skipped.
pub fn parse_submission_str(content: &str) -> Result<Vec<JobRequest>, SubmissionError> {
    let mut requests = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let cells: Vec<&str> = raw.split(',').collect();
        let first = cells.first().map(|c| c.trim()).unwrap_or_default();
        if first.starts_with('#') || cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let request =
            parse_row(&cells).map_err(|message| SubmissionError::row(index + 1, message))?;
        requests.push(request);
    }

    Ok(requests)
}

fn parse_row(cells: &[&str]) -> Result<JobRequest, String> {
    let mut job_type = None;
    let mut params = BTreeMap::new();

    for cell in cells {
        let cell: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
        let (key, value) = match cell.split('=').collect::<Vec<_>>().as_slice() {
            [key, value] if !key.is_empty() => (key.to_string(), value.to_string()),
            _ => return Err("invalid cell format, must be key=value".to_string()),
        };

        if key == "job_type" {
            job_type = Some(value);
        } else {
            params.insert(key, value);
        }
    }

    let job_type = job_type.ok_or_else(|| "job_type cell not defined".to_string())?;
    let obs_id: ObsId = required(&mut params, "obs_id")?;

    let request = match job_type.as_str() {
        "c" => JobRequest::Conversion(ConversionParams {
            obs_id,
            options: params,
        }),
        "d" => {
            let download_type = params
                .remove("download_type")
                .ok_or_else(|| "download_type cell not defined".to_string())?;
            reject_extra(&params)?;
            JobRequest::Download(DownloadParams {
                obs_id,
                download_type,
            })
        }
        "v" => {
            let offset = required(&mut params, "offset")?;
            let duration = required(&mut params, "duration")?;
            reject_extra(&params)?;
            JobRequest::Voltage(VoltageParams {
                obs_id,
                offset,
                duration,
            })
        }
        _ => return Err("unknown job_type".to_string()),
    };

    Ok(request)
}

/// Remove `key` from `params` and parse it as an unsigned integer.
fn required(params: &mut BTreeMap<String, String>, key: &str) -> Result<u64, String> {
    let value = params
        .remove(key)
        .ok_or_else(|| format!("{} cell not defined", key))?;
    value
        .parse()
        .map_err(|_| format!("invalid {} value '{}'", key, value))
}

fn reject_extra(params: &BTreeMap<String, String>) -> Result<(), String> {
    match params.keys().next() {
        Some(key) => Err(format!("unexpected cell '{}' for this job_type", key)),
        None => Ok(()),
    }
}
