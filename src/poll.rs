//! Status polling for altool submissions.
//!
//! The poller sleeps before every query, including the first; the service is
//! known to reject status requests issued right after an upload.
use crate::classify::{Classification, Classifier, Phase};
use crate::error::NotarizeError;
use crate::job::{Backend, Verdict};
use crate::response::StructuredResponse;
use crate::retry::{Clock, RetryBudget, RetryPolicy};
use crate::runner::{ToolInvocation, ToolRunner};
use anyhow::Result;

const STATUS_FIELD: [&str; 2] = ["notarization-info", "Status"];
const STATUS_MESSAGE_FIELD: [&str; 2] = ["notarization-info", "Status Message"];
const LOG_URL_FIELD: [&str; 2] = ["notarization-info", "LogFileURL"];

/// Map the service's status text to a verdict. `None` for vocabulary this
/// tool does not know.
pub fn interpret_verdict(status: &str) -> Option<Verdict> {
    let status = status.to_ascii_lowercase();
    if status.contains("in progress") {
        Some(Verdict::Pending)
    } else if status.contains("success") {
        Some(Verdict::Succeeded)
    } else if status.contains("invalid") || status.contains("rejected") {
        Some(Verdict::Failed)
    } else {
        None
    }
}

pub struct VerdictPoller<'a> {
    pub classifier: &'a Classifier,
    pub username: &'a str,
    pub password: &'a str,
    pub policy: &'a RetryPolicy,
    pub clock: &'a dyn Clock,
}

impl VerdictPoller<'_> {
    /// Loop until the job leaves `Pending`. A rejecting verdict is returned
    /// as `NotarizeError::Rejected`.
    pub fn wait_for_verdict(&self, runner: &mut dyn ToolRunner, job_id: &str) -> Result<Verdict> {
        let mut budget = RetryBudget::new("status polling", self.policy, self.clock);
        loop {
            let attempt = budget.begin_attempt()?;
            tracing::info!(
                attempt,
                "notarization in progress; checking status in {} seconds",
                budget.interval_secs()
            );
            budget.wait();
            match self.query(runner, job_id)? {
                Verdict::Pending => continue,
                verdict => return Ok(verdict),
            }
        }
    }

    /// One status query. Transient errors read as `Pending`.
    pub fn query(&self, runner: &mut dyn ToolRunner, job_id: &str) -> Result<Verdict> {
        let invocation = ToolInvocation::new("xcrun")
            .args(["altool", "--notarization-info", job_id, "--username", self.username])
            .arg("--password")
            .secret_arg(self.password)
            .args(["--output-format", "xml"]);
        let output = runner.run(&invocation)?;
        let response = StructuredResponse::parse("altool", &output.lines)?;

        if !output.success() {
            let response = response.require_payload()?;
            if response.errors().is_empty() {
                return Err(NotarizeError::Remote {
                    code: None,
                    message: format!("altool status query failed with exit status {}", output.status),
                    output: output.lines,
                }
                .into());
            }
            for error in response.errors() {
                match self
                    .classifier
                    .classify(Backend::Legacy, Phase::StatusQuery, error)
                {
                    Classification::TransientRetryable => {
                        tracing::debug!(message = %error.message, "transient status error");
                    }
                    Classification::Fatal | Classification::BenignDuplicate { .. } => {
                        return Err(NotarizeError::Remote {
                            code: Some(error.code),
                            message: error.message.clone(),
                            output: output.lines,
                        }
                        .into());
                    }
                }
            }
            tracing::warn!(
                job_id,
                "the notary service does not recognize the job ID it just issued; retrying"
            );
            return Ok(Verdict::Pending);
        }

        let response = response.require_payload()?;
        let status = response.string_field(&STATUS_FIELD)?;
        tracing::debug!(status, "notarization status");
        match interpret_verdict(status) {
            Some(Verdict::Failed) => {
                let mut message = response
                    .optional_string_field(&STATUS_MESSAGE_FIELD)
                    .unwrap_or(status)
                    .to_string();
                if let Some(url) = response.optional_string_field(&LOG_URL_FIELD) {
                    message.push_str(&format!(" (log: {url})"));
                }
                Err(NotarizeError::Rejected {
                    job_id: job_id.to_string(),
                    message,
                    output: output.lines,
                }
                .into())
            }
            Some(verdict) => Ok(verdict),
            None => Err(NotarizeError::Remote {
                code: None,
                message: format!("unrecognized notarization status {status:?}"),
                output: output.lines,
            }
            .into()),
        }
    }
}
