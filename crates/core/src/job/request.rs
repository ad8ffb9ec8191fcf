//! Job submission requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::ObsId;

/// Parameters of a conversion job.
///
/// Conversion takes a large, evolving set of optional tuning knobs
/// (`timeres`, `freqres`, `edgewidth`, flags...), so they are passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionParams {
    pub obs_id: ObsId,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Parameters of a visibility/metadata download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    pub obs_id: ObsId,
    /// Server-defined download type, e.g. `vis` or `vis_meta`.
    pub download_type: String,
}

/// Parameters of a voltage download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltageParams {
    pub obs_id: ObsId,
    /// Seconds from the observation start.
    pub offset: u64,
    /// Seconds of data.
    pub duration: u64,
}

/// A job to submit, one variant per server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobRequest {
    Conversion(ConversionParams),
    Download(DownloadParams),
    Voltage(VoltageParams),
}

impl JobRequest {
    /// Observation the request targets.
    pub fn obs_id(&self) -> ObsId {
        match self {
            JobRequest::Conversion(p) => p.obs_id,
            JobRequest::Download(p) => p.obs_id,
            JobRequest::Voltage(p) => p.obs_id,
        }
    }

    /// API path the request is posted to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            JobRequest::Conversion(_) => "/api/conversion_job",
            JobRequest::Download(_) => "/api/download_vis_job",
            JobRequest::Voltage(_) => "/api/voltage_job",
        }
    }

    /// Form parameters sent with the request.
    pub fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![("obs_id".to_string(), self.obs_id().to_string())];
        match self {
            JobRequest::Conversion(p) => {
                form.extend(p.options.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            JobRequest::Download(p) => {
                form.push(("download_type".to_string(), p.download_type.clone()));
            }
            JobRequest::Voltage(p) => {
                form.push(("offset".to_string(), p.offset.to_string()));
                form.push(("duration".to_string(), p.duration.to_string()));
            }
        }
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_form() {
        let mut options = BTreeMap::new();
        options.insert("timeres".to_string(), "4".to_string());
        options.insert("conversion".to_string(), "ms".to_string());
        let req = JobRequest::Conversion(ConversionParams {
            obs_id: 1000,
            options,
        });

        assert_eq!(req.endpoint(), "/api/conversion_job");
        let form = req.form();
        assert_eq!(form[0], ("obs_id".to_string(), "1000".to_string()));
        assert!(form.contains(&("timeres".to_string(), "4".to_string())));
        assert!(form.contains(&("conversion".to_string(), "ms".to_string())));
    }

    #[test]
    fn test_voltage_form() {
        let req = JobRequest::Voltage(VoltageParams {
            obs_id: 1234,
            offset: 10,
            duration: 8,
        });
        assert_eq!(req.endpoint(), "/api/voltage_job");
        assert_eq!(
            req.form(),
            vec![
                ("obs_id".to_string(), "1234".to_string()),
                ("offset".to_string(), "10".to_string()),
                ("duration".to_string(), "8".to_string()),
            ]
        );
    }

    #[test]
    fn test_download_serialization_is_tagged() {
        let req = JobRequest::Download(DownloadParams {
            obs_id: 5,
            download_type: "vis_meta".to_string(),
        });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["job_type"], "download");
        assert_eq!(json["download_type"], "vis_meta");
    }
}
