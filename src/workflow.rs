//! The notarization run: prepare, submit, poll, copy and staple.
//!
//! `Orchestrator` is the only place that carries state across steps. The
//! temporary archive lives in the `PreparedPackage` held for the whole run,
//! so an early return removes it as well.
use crate::classify::Classifier;
use crate::job::{Backend, Job, Verdict};
use crate::output::copy_to_outdir;
use crate::package::{self, PreparedPackage};
use crate::poll::VerdictPoller;
use crate::report::RunReport;
use crate::retry::Clock;
use crate::runner::ToolRunner;
use crate::settings::{Credentials, Settings, DISABLE_ENV_VAR};
use crate::staple;
use crate::submit::{locate_notarytool, SubmissionClient};
use crate::util::humanize_duration;
use anyhow::{anyhow, Result};

pub struct Orchestrator<'a> {
    settings: &'a Settings,
    clock: &'a dyn Clock,
    classifier: Classifier,
}

impl<'a> Orchestrator<'a> {
    pub fn new(settings: &'a Settings, clock: &'a dyn Clock) -> Self {
        Self {
            settings,
            clock,
            classifier: Classifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn run(&self, runner: &mut dyn ToolRunner) -> Result<RunReport> {
        let settings = self.settings;
        let started = self.clock.now();
        let mut report = RunReport::new(
            settings.artifact.clone(),
            settings.backend(),
            settings.notarization_disabled,
        );

        if settings.notarization_disabled {
            tracing::info!("notarization is suppressed by the {DISABLE_ENV_VAR} env var");
            if let Some(outdir) = &settings.outdir {
                report.output_copy = Some(copy_to_outdir(runner, &settings.artifact, outdir)?);
            }
        } else {
            self.notarize(runner, &mut report)?;
        }

        let elapsed = self.clock.now().saturating_duration_since(started);
        report.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        tracing::info!("total time: {}", humanize_duration(elapsed));
        Ok(report)
    }

    fn notarize(&self, runner: &mut dyn ToolRunner, report: &mut RunReport) -> Result<()> {
        let settings = self.settings;
        let backend = settings.backend();
        let notarytool = match backend {
            Backend::Integrated => Some(locate_notarytool(runner)?),
            Backend::Legacy => None,
        };

        let prepared = package::prepare(
            runner,
            &settings.artifact,
            backend,
            settings.bundle_id.as_deref(),
        )?;
        let mut job = Job::new(settings.artifact.clone(), backend, prepared.bundle_id.clone());
        job.artifact_path = prepared.submission_path.clone();

        let client = SubmissionClient {
            classifier: &self.classifier,
            credentials: &settings.credentials,
            notarytool: notarytool.as_deref(),
            verbose: settings.debug,
        };
        let submission = client.submit(runner, &job)?;
        job.job_id = Some(submission.job_id.clone());
        job.already_submitted = submission.already_submitted;
        job.verdict = submission.verdict;
        report.job_id = Some(submission.job_id.clone());
        report.already_submitted = submission.already_submitted;

        if job.needs_polling() {
            job.verdict = self.poll(runner, &submission.job_id)?;
        }
        report.verdict = Some(job.verdict);
        tracing::info!(job_id = %submission.job_id, "notarization succeeded");

        if job.is_archived() {
            job.restore_original_path();
        }
        let staple_target = match &settings.outdir {
            Some(outdir) => {
                let copy = copy_to_outdir(runner, &job.artifact_path, outdir)?;
                report.output_copy = Some(copy.clone());
                copy
            }
            None => job.artifact_path.clone(),
        };
        report.staple = Some(staple::staple(
            runner,
            &staple_target,
            &settings.retry,
            self.clock,
        )?);

        release(prepared)
    }

    fn poll(&self, runner: &mut dyn ToolRunner, job_id: &str) -> Result<Verdict> {
        let Credentials::AppSpecificPassword {
            username, password, ..
        } = &self.settings.credentials
        else {
            return Err(anyhow!("status polling needs altool credentials"));
        };
        VerdictPoller {
            classifier: &self.classifier,
            username,
            password,
            policy: &self.settings.retry,
            clock: self.clock,
        }
        .wait_for_verdict(runner, job_id)
    }
}

fn release(prepared: PreparedPackage) -> Result<()> {
    if prepared.is_archived() {
        tracing::debug!(archive = %prepared.submission_path.display(), "removing temporary archive");
    }
    prepared.cleanup()
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
