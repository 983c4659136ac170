//! State carried through one notarization attempt.
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Remote submission protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// `altool`: upload, then poll for status.
    Legacy,
    /// `notarytool submit --wait`: blocks until the verdict is ready.
    Integrated,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Legacy => write!(f, "altool"),
            Backend::Integrated => write!(f, "notarytool"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pending,
    Succeeded,
    Failed,
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Pending)
    }
}

/// One artifact moving through prepare, submit, poll and staple.
#[derive(Debug, Clone)]
pub struct Job {
    /// Path handed to the tool; points at the temporary archive while a
    /// bundle is being submitted.
    pub artifact_path: PathBuf,
    /// Path the caller supplied.
    pub original_path: PathBuf,
    pub backend: Backend,
    pub bundle_id: Option<String>,
    pub job_id: Option<String>,
    pub already_submitted: bool,
    pub verdict: Verdict,
}

impl Job {
    pub fn new(artifact: PathBuf, backend: Backend, bundle_id: Option<String>) -> Self {
        Self {
            artifact_path: artifact.clone(),
            original_path: artifact,
            backend,
            bundle_id,
            job_id: None,
            already_submitted: false,
            verdict: Verdict::Pending,
        }
    }

    /// Point the job back at the caller's artifact after archive submission.
    pub fn restore_original_path(&mut self) {
        self.artifact_path = self.original_path.clone();
    }

    pub fn is_archived(&self) -> bool {
        self.artifact_path != self.original_path
    }

    /// Whether the status poller has to run for this job.
    pub fn needs_polling(&self) -> bool {
        self.backend == Backend::Legacy && !self.already_submitted
    }
}
