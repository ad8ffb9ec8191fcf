//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

use asvo_core::JobId;

use crate::exit_error::ExitError;

const USAGE: &str = "\
Examples:
  mwa_client -c csvfile -d destdir    Submit jobs in the csv file, monitor them, download the files, then exit
  mwa_client -c csvfile -s            Submit jobs in the csv file, then exit
  mwa_client -d destdir -w JOBID      Download the job id (if it is ready to download), then exit
  mwa_client -d destdir -w 0          Download every ready to download job, then exit
  mwa_client -l                       List all of your jobs and their status, then exit

Credentials come from ASVO_USER and ASVO_PASS; ASVO_HOST and ASVO_PORT select the server.";

/// Submit, monitor and download MWA ASVO jobs.
#[derive(Debug, Parser)]
#[command(name = "mwa_client", version, after_help = USAGE)]
pub struct Args {
    /// CSV job file
    #[arg(short = 'c', long = "csv", value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Download directory
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Submit job(s) from the csv file, then exit (-d is ignored)
    #[arg(short = 's', long = "submit-only")]
    pub submit_only: bool,

    /// List your jobs and exit (-c and -d are ignored)
    #[arg(short = 'l', long = "list-only")]
    pub list_only: bool,

    /// Download this job if it is ready, or every ready job with 0, then exit
    #[arg(short = 'w', long = "download-only", value_name = "JOB_ID")]
    pub download_job_id: Option<JobId>,

    /// Ask the server to cancel this job, then exit
    #[arg(long = "cancel", value_name = "JOB_ID")]
    pub cancel_job_id: Option<JobId>,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Write a JSON report of failed jobs to this file
    #[arg(short = 'e', long = "error-file", value_name = "FILE")]
    pub error_file: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long = "config", env = "ASVO_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Mode picked by the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    Full,
    SubmitOnly,
    ListOnly,
    DownloadOnly(JobId),
    Cancel(JobId),
}

impl Args {
    /// Resolve the mode. The mode flags are mutually exclusive.
    pub fn selected(&self) -> Result<Selected, ExitError> {
        let chosen = [
            self.submit_only,
            self.list_only,
            self.download_job_id.is_some(),
            self.cancel_job_id.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if chosen > 1 {
            return Err(ExitError::new(
                1,
                "Error: --submit-only (-s), --list-only (-l), --download-only (-w) and --cancel cannot be used together.",
            ));
        }

        let selected = if self.submit_only {
            Selected::SubmitOnly
        } else if self.list_only {
            Selected::ListOnly
        } else if let Some(job_id) = self.download_job_id {
            Selected::DownloadOnly(job_id)
        } else if let Some(job_id) = self.cancel_job_id {
            Selected::Cancel(job_id)
        } else {
            Selected::Full
        };

        if matches!(selected, Selected::Full | Selected::SubmitOnly) && self.csv.is_none() {
            return Err(ExitError::new(1, "Error: csvfile not specified"));
        }

        Ok(selected)
    }

    /// Download directory; defaults to the current directory and must exist.
    pub fn output_dir(&self) -> Result<PathBuf, ExitError> {
        match &self.dir {
            None => Ok(PathBuf::from(".")),
            Some(dir) if dir.is_dir() => Ok(dir.clone()),
            Some(dir) => Err(ExitError::new(
                1,
                format!("Error: Output directory {} is invalid.", dir.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("mwa_client").chain(args.iter().copied()))
    }

    #[test]
    fn test_full_mode_needs_csv() {
        assert_eq!(parse(&["-c", "jobs.csv"]).selected().unwrap(), Selected::Full);

        let err = parse(&[]).selected().unwrap_err();
        assert_eq!(err.code, 1);
        assert_eq!(err.message, "Error: csvfile not specified");
    }

    #[test]
    fn test_single_modes() {
        assert_eq!(
            parse(&["-c", "jobs.csv", "-s"]).selected().unwrap(),
            Selected::SubmitOnly
        );
        assert_eq!(parse(&["-l"]).selected().unwrap(), Selected::ListOnly);
        assert_eq!(
            parse(&["-w", "0"]).selected().unwrap(),
            Selected::DownloadOnly(0)
        );
        assert_eq!(
            parse(&["--download-only", "123"]).selected().unwrap(),
            Selected::DownloadOnly(123)
        );
        assert_eq!(
            parse(&["--cancel", "9"]).selected().unwrap(),
            Selected::Cancel(9)
        );
    }

    #[test]
    fn test_modes_are_exclusive() {
        for args in [
            vec!["-s", "-l"],
            vec!["-l", "-w", "1"],
            vec!["-c", "jobs.csv", "-s", "-w", "0"],
            vec!["-l", "--cancel", "3"],
        ] {
            let err = parse(&args).selected().unwrap_err();
            assert!(err.message.contains("cannot be used together"), "{:?}", args);
        }
    }

    #[test]
    fn test_other_flags() {
        let args = parse(&["-l", "-v", "-e", "errors.json"]);
        assert!(args.verbose);
        assert_eq!(args.error_file, Some(PathBuf::from("errors.json")));
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(parse(&["-l"]).output_dir().unwrap(), PathBuf::from("."));

        let dir = TempDir::new().unwrap();
        let path = dir.path().to_str().unwrap();
        assert_eq!(
            parse(&["-w", "0", "-d", path]).output_dir().unwrap(),
            dir.path()
        );

        let err = parse(&["-w", "0", "-d", "/nonexistent/out"])
            .output_dir()
            .unwrap_err();
        assert!(err.message.contains("is invalid"));
    }

    #[test]
    fn test_non_numeric_job_id_is_rejected() {
        assert!(Args::try_parse_from(["mwa_client", "-w", "abc"]).is_err());
    }
}
