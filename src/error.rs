//! Failure taxonomy for a notarization run.
//!
//! Plumbing errors travel as `anyhow::Error` with context strings; the
//! conditions the run must report distinctly are wrapped in `NotarizeError`
//! so the binary can pick an exit code and dump the vendor tool output.
use std::time::Duration;
use thiserror::Error;

/// Exit code for invalid or missing inputs.
pub const EXIT_PRECONDITION: u8 = 2;
/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum NotarizeError {
    /// Bad or missing inputs, detected before any remote interaction.
    #[error("{0}")]
    Precondition(String),

    /// The structured payload could not be located or decoded.
    #[error("could not parse {tool} output: {reason}")]
    Parse {
        tool: &'static str,
        reason: String,
        output: Vec<String>,
    },

    /// A remote error the classifier judged fatal, surfaced verbatim.
    #[error("{message}")]
    Remote {
        code: Option<i64>,
        message: String,
        output: Vec<String>,
    },

    /// The notary service issued a rejecting verdict.
    #[error("notarization of job {job_id} failed: {message}")]
    Rejected {
        job_id: String,
        message: String,
        output: Vec<String>,
    },

    /// A local helper tool exited non-zero.
    #[error("{action} failed with exit status {status}")]
    Tool {
        action: String,
        status: i32,
        output: Vec<String>,
    },

    /// A configured retry bound was reached before the operation finished.
    #[error("{operation} gave up after {attempts} attempts ({} s)", .waited.as_secs())]
    RetryLimit {
        operation: &'static str,
        attempts: u32,
        waited: Duration,
    },
}

impl NotarizeError {
    pub fn precondition(message: impl Into<String>) -> Self {
        NotarizeError::Precondition(message.into())
    }

    /// Full output of the external call that produced this error, if any.
    pub fn captured_output(&self) -> &[String] {
        match self {
            NotarizeError::Parse { output, .. }
            | NotarizeError::Remote { output, .. }
            | NotarizeError::Rejected { output, .. }
            | NotarizeError::Tool { output, .. } => output,
            NotarizeError::Precondition(_) | NotarizeError::RetryLimit { .. } => &[],
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            NotarizeError::Precondition(_) => EXIT_PRECONDITION,
            _ => EXIT_FAILURE,
        }
    }
}

/// Map any run failure to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<NotarizeError>()
        .map(NotarizeError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
