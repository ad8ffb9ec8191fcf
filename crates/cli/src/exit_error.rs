//! Error type that carries a process exit code.
//!
//! `run()` returns `ExitError` instead of calling `std::process::exit()`
//! directly, so `main()` alone decides how the process ends.

use std::fmt;

use asvo_core::OrchestratorError;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Exit code for an error escaping `run()`.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(exit) = error.downcast_ref::<ExitError>() {
        return exit.code;
    }
    if let Some(err) = error.downcast_ref::<OrchestratorError>() {
        return err.exit_code();
    }
    1
}

#[cfg(test)]
mod tests {
    use asvo_core::{ServiceError, SubmissionError};

    use super::*;

    #[test]
    fn test_exit_error_code() {
        let err: anyhow::Error = ExitError::new(4, "").into();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn test_orchestrator_error_codes() {
        let err: anyhow::Error =
            OrchestratorError::from(SubmissionError::row(2, "unknown job_type")).into();
        assert_eq!(exit_code(&err), 3);

        let err: anyhow::Error = OrchestratorError::from(ServiceError::Rejected {
            status: 401,
            body: "Unauthorized".to_string(),
        })
        .into();
        assert_eq!(exit_code(&err), 2);

        let err: anyhow::Error = OrchestratorError::ConnectionLost.into();
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_other_errors_exit_1() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), 1);
    }
}
