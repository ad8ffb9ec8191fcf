//! JSON error report written at the end of a run.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::job::{JobId, ObsId};
use crate::orchestrator::JobResult;

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    job_id: JobId,
    obs_id: Option<ObsId>,
    result: &'a str,
}

/// Render results as the report's JSON array `[{job_id, obs_id, result}]`.
pub fn render_error_report(results: &[JobResult]) -> Result<String, serde_json::Error> {
    let entries: Vec<ReportEntry<'_>> = results
        .iter()
        .map(|r| ReportEntry {
            job_id: r.job_id,
            obs_id: r.obs_id,
            result: &r.plain,
        })
        .collect();
    serde_json::to_string_pretty(&entries)
}

/// Write the error report to `path`, replacing any previous content.
pub fn write_error_report(path: &Path, results: &[JobResult]) -> std::io::Result<()> {
    let json = render_error_report(results)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    tracing::info!("Wrote {} result(s) to {}", results.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::message::{Styled, Tone};

    fn result(job_id: JobId, obs_id: Option<ObsId>, text: &str) -> JobResult {
        JobResult::new(job_id, obs_id, &Styled::new().push(Tone::Red, text), true)
    }

    #[test]
    fn test_report_uses_plain_messages() {
        let json = render_error_report(&[result(55, Some(1000), "Error: disk full")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"job_id": 55, "obs_id": 1000, "result": "Error: disk full"}])
        );
    }

    #[test]
    fn test_unknown_obs_id_is_null() {
        let json = render_error_report(&[result(7, None, "not a valid job")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value[0]["obs_id"].is_null());
    }

    #[test]
    fn test_write_truncates_previous_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("errors.json");
        std::fs::write(&path, "x".repeat(4096)).unwrap();

        write_error_report(&path, &[result(1, Some(2), "Expired")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert!(!content.contains("xxxx"));
    }

    #[test]
    fn test_empty_report() {
        assert_eq!(render_error_report(&[]).unwrap(), "[]");
    }
}
