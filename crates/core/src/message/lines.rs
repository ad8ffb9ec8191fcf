use crate::job::{EventAction, Job, JobId, JobState};

use super::{Styled, Tone};

fn job_header(job: &Job, verbose: bool) -> Styled {
    let obs = job
        .obs_id
        .map(|o| o.to_string())
        .unwrap_or_else(|| "(unknown)".to_string());
    let line = Styled::new()
        .plain("Job id: ")
        .value(job.id)
        .plain(" Obs id: ")
        .value(obs)
        .plain(" type: ")
        .value(job.job_type.description());

    if verbose {
        line.plain(" typeid: ")
            .value(job.job_type.code())
            .plain(" params: ")
            .value(format!("{:?}", job.params))
    } else {
        line
    }
}

/// Status line describing a job snapshot as seen in an event or listing.
pub fn job_status(action: EventAction, job: &Job, verbose: bool) -> Styled {
    let header = job_header(job, verbose);

    if action == EventAction::Delete {
        return Styled::new()
            .push(Tone::Red, "Deleted")
            .plain(": ")
            .append(header);
    }

    match job.state {
        JobState::Queued => Styled::new()
            .push(Tone::Magenta, job.state.label())
            .plain(": ")
            .append(header),
        JobState::Processing => Styled::new()
            .push(Tone::Blue, job.state.label())
            .plain(": ")
            .append(header),
        JobState::ReadyForDownload => Styled::new()
            .push(Tone::Magenta, job.state.label())
            .plain(": ")
            .append(header)
            .plain(" size: ")
            .value(job.total_size())
            .plain(" bytes"),
        JobState::Error => Styled::new()
            .push(Tone::Red, job.state.label())
            .plain(": ")
            .plain(job.error_text.as_deref().unwrap_or("(no error text)"))
            .plain("; ")
            .append(header),
        JobState::Expired => Styled::new()
            .plain(job.state.label())
            .plain(": ")
            .append(header),
        JobState::Cancelled => Styled::new()
            .push(Tone::Red, job.state.label())
            .plain(": ")
            .append(header),
    }
}

pub fn submitted(job_id: JobId) -> Styled {
    Styled::new().plain("Submitted job: ").value(job_id)
}

pub fn already_exists(job_id: JobId) -> Styled {
    Styled::new()
        .plain("Job: ")
        .value(job_id)
        .plain(" already exists")
}

pub fn cancel_requested(job_id: JobId) -> Styled {
    Styled::new()
        .push(Tone::Red, "Cancel requested")
        .plain(": Job id: ")
        .value(job_id)
}

/// A submission the server refused; the run continues without it.
pub fn submission_skipped(index: usize, reason: &str) -> Styled {
    Styled::new()
        .push(Tone::Magenta, "Skipped")
        .plain(": job #")
        .value(index)
        .plain(" from csv file was not accepted: ")
        .plain(reason)
}

pub fn downloading(job_id: JobId, file: &str, size_bytes: u64) -> Styled {
    Styled::new()
        .push(Tone::Magenta, "Downloading:")
        .plain(" Job id: ")
        .value(job_id)
        .plain(" file: ")
        .value(file)
        .plain(" size: ")
        .value(size_bytes)
        .plain(" bytes")
}

pub fn download_complete(job_id: JobId, file: &str, content_hash: Option<&str>) -> Styled {
    Styled::new()
        .push(Tone::Green, "Download complete:")
        .plain(" Job id: ")
        .value(job_id)
        .plain(" file: ")
        .value(file)
        .plain(" server-sha1: ")
        .value(content_hash.unwrap_or("(not defined)"))
}

pub fn download_failed(job_id: JobId, file: &str, error: &dyn std::error::Error) -> Styled {
    Styled::new()
        .push(Tone::Red, "Download failed:")
        .plain(" Job id: ")
        .value(job_id)
        .plain(" file: ")
        .value(file)
        .plain(" error: ")
        .plain(error)
}

pub fn on_shared_storage(job_id: JobId, path: &str) -> Styled {
    Styled::new()
        .push(Tone::Green, "Available:")
        .plain(" Job id: ")
        .value(job_id)
        .plain(" files are on shared storage at: ")
        .value(path)
}

pub fn not_a_valid_job(job_id: JobId) -> Styled {
    Styled::new()
        .push(Tone::Red, "Error:")
        .plain(" Job Id ")
        .value(job_id)
        .plain(" is not a valid job, has expired or is not owned by you.")
}

pub fn not_ready_for_download(job: &Job) -> Styled {
    Styled::new()
        .push(Tone::Red, "Error:")
        .plain(" unable to download Job Id ")
        .value(job.id)
        .plain(". Invalid job state - job not ready for download: ")
        .append(job_status(EventAction::Upsert, job, false))
}
