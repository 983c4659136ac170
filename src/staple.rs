//! Stapling the notarization ticket onto the finished artifact.
//!
//! Tickets become available a little after the verdict, so failed attempts
//! are retried on the poll interval.
use crate::package::has_extension;
use crate::retry::{Clock, RetryBudget, RetryPolicy};
use crate::runner::{ToolInvocation, ToolRunner};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// Extensions `stapler` always fails on.
pub const UNSUPPORTED_EXTENSIONS: [&str; 2] = ["framework", "zip"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StapleOutcome {
    Stapled { attempts: u32 },
    Skipped { extension: String },
}

pub fn unsupported_extension(path: &Path) -> Option<&'static str> {
    UNSUPPORTED_EXTENSIONS
        .into_iter()
        .find(|ext| has_extension(path, ext))
}

pub fn staple(
    runner: &mut dyn ToolRunner,
    path: &Path,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> Result<StapleOutcome> {
    if let Some(extension) = unsupported_extension(path) {
        tracing::info!(path = %path.display(), "not stapling .{extension} artifact; unsupported");
        return Ok(StapleOutcome::Skipped {
            extension: extension.to_string(),
        });
    }

    let invocation = ToolInvocation::new("xcrun")
        .args(["stapler", "staple"])
        .path_arg(path);
    let mut budget = RetryBudget::new("stapling", policy, clock);
    loop {
        let attempt = budget.begin_attempt()?;
        tracing::info!(path = %path.display(), attempt, "stapling");
        let output = runner.run(&invocation)?;
        if output.success() {
            return Ok(StapleOutcome::Stapled { attempts: attempt });
        }
        tracing::debug!(status = output.status, output = ?output.lines, "staple attempt failed");
        if !budget.has_next_attempt() {
            return Err(budget.limit_reached().into());
        }
        tracing::info!(
            "waiting for Apple's servers to sync; retrying in {} seconds",
            budget.interval_secs()
        );
        budget.wait();
    }
}
