//! Upload to the notary service through altool or notarytool.
use crate::classify::{Classification, Classifier, Phase};
use crate::error::NotarizeError;
use crate::job::{Backend, Job, Verdict};
use crate::poll::interpret_verdict;
use crate::response::{IntegratedProgress, StructuredResponse};
use crate::runner::{ToolInvocation, ToolRunner};
use crate::settings::Credentials;
use anyhow::{anyhow, Result};

/// Job id reported when notarytool's output has no `id:` line.
pub const UNKNOWN_JOB_ID: &str = "UNKNOWN";

const UPLOAD_ID_FIELD: [&str; 2] = ["notarization-upload", "RequestUUID"];

/// Result of a successful (or tolerated duplicate) upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
    pub already_submitted: bool,
    /// `Pending` for fresh altool uploads; notarytool already waited.
    pub verdict: Verdict,
}

/// Resolve notarytool through `xcrun --find`. The first output line is the
/// tool's absolute path.
pub fn locate_notarytool(runner: &mut dyn ToolRunner) -> Result<String> {
    let output = runner.run(&ToolInvocation::new("xcrun").args(["--find", "notarytool"]))?;
    let path = output
        .lines
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty());
    match path {
        Some(path) if output.success() => {
            tracing::debug!(path, "found notarytool");
            Ok(path.to_string())
        }
        _ => Err(NotarizeError::precondition(
            "notarytool is not installed; it ships with Xcode 13 and later",
        )
        .into()),
    }
}

pub struct SubmissionClient<'a> {
    pub classifier: &'a Classifier,
    pub credentials: &'a Credentials,
    /// Absolute notarytool path from `locate_notarytool`.
    pub notarytool: Option<&'a str>,
    pub verbose: bool,
}

impl SubmissionClient<'_> {
    pub fn submit(&self, runner: &mut dyn ToolRunner, job: &Job) -> Result<Submission> {
        tracing::info!(
            artifact = %job.artifact_path.display(),
            backend = %job.backend,
            "uploading package to Apple"
        );
        match job.backend {
            Backend::Legacy => self.submit_legacy(runner, job),
            Backend::Integrated => self.submit_integrated(runner, job),
        }
    }

    fn submit_legacy(&self, runner: &mut dyn ToolRunner, job: &Job) -> Result<Submission> {
        let Credentials::AppSpecificPassword {
            username,
            password,
            asc_provider,
        } = self.credentials
        else {
            return Err(anyhow!("altool upload needs an Apple ID and password"));
        };
        let bundle_id = job
            .bundle_id
            .as_deref()
            .ok_or_else(|| NotarizeError::precondition("specify a valid --primary-bundle-id"))?;

        let mut invocation = ToolInvocation::new("xcrun")
            .args(["altool", "--notarize-app", "-t", "osx", "--output-format", "xml"])
            .arg("--file")
            .path_arg(&job.artifact_path)
            .args(["--primary-bundle-id", bundle_id, "--username", username.as_str()])
            .arg("--password")
            .secret_arg(password.as_str());
        if let Some(provider) = asc_provider {
            invocation = invocation.args(["--asc-provider", provider.as_str()]);
        }

        let output = runner.run(&invocation)?;
        let response = StructuredResponse::parse("altool", &output.lines)?;

        if output.success() {
            let response = response.require_payload()?;
            let job_id = response.string_field(&UPLOAD_ID_FIELD)?.to_string();
            tracing::info!(job_id = %job_id, "package uploaded");
            return Ok(Submission {
                job_id,
                already_submitted: false,
                verdict: Verdict::Pending,
            });
        }

        let response = response.require_payload()?;
        if response.errors().is_empty() {
            return Err(NotarizeError::Remote {
                code: None,
                message: format!("altool upload failed with exit status {}", output.status),
                output: output.lines,
            }
            .into());
        }

        let mut duplicate = None;
        for error in response.errors() {
            match self.classifier.classify(Backend::Legacy, Phase::Submit, error) {
                Classification::BenignDuplicate { content_id } => {
                    tracing::debug!(message = %error.message, "duplicate upload");
                    duplicate.get_or_insert(content_id);
                }
                Classification::Fatal | Classification::TransientRetryable => {
                    return Err(NotarizeError::Remote {
                        code: Some(error.code),
                        message: error.message.clone(),
                        output: output.lines,
                    }
                    .into());
                }
            }
        }

        let job_id =
            duplicate.ok_or_else(|| anyhow!("altool reported errors without a classification"))?;
        tracing::warn!(
            job_id = %job_id,
            "the notary service says this package was already uploaded; continuing"
        );
        Ok(Submission {
            job_id,
            already_submitted: true,
            verdict: Verdict::Succeeded,
        })
    }

    fn submit_integrated(&self, runner: &mut dyn ToolRunner, job: &Job) -> Result<Submission> {
        let program = self
            .notarytool
            .ok_or_else(|| anyhow!("notarytool path was not resolved before upload"))?;
        let mut invocation = ToolInvocation::new(program)
            .arg("submit")
            .path_arg(&job.artifact_path)
            .arg("--wait")
            .echo(true);
        invocation = match self.credentials {
            Credentials::KeychainProfile { profile } => {
                invocation.args(["--keychain-profile", profile.as_str()])
            }
            Credentials::AppleId {
                username,
                team_id,
                password,
            } => {
                let invocation =
                    invocation.args(["--apple-id", username.as_str(), "--team-id", team_id.as_str()]);
                match password {
                    Some(password) => invocation.arg("--password").secret_arg(password.as_str()),
                    None => invocation,
                }
            }
            Credentials::AppSpecificPassword { .. } => {
                return Err(anyhow!("notarytool upload needs a keychain profile or team ID"));
            }
        };
        if self.verbose {
            invocation = invocation.arg("--verbose");
        }

        let output = runner.run(&invocation)?;
        if let Some(Classification::Fatal) = self.classifier.classify_exit(output.status) {
            return Err(NotarizeError::Remote {
                code: None,
                message: format!("notarytool submit failed with exit status {}", output.status),
                output: output.lines,
            }
            .into());
        }

        let progress = IntegratedProgress::scan(&output.lines);
        let job_id = match progress.submission_id {
            Some(id) => id,
            None => {
                tracing::warn!("could not find the submission ID in notarytool output");
                UNKNOWN_JOB_ID.to_string()
            }
        };
        if let Some(status) = progress.status.as_deref() {
            if interpret_verdict(status) == Some(Verdict::Failed) {
                return Err(NotarizeError::Rejected {
                    job_id,
                    message: format!("notarytool reported status {status}"),
                    output: output.lines,
                }
                .into());
            }
        }

        tracing::info!(job_id = %job_id, "package submission complete");
        Ok(Submission {
            job_id,
            already_submitted: false,
            verdict: Verdict::Succeeded,
        })
    }
}
