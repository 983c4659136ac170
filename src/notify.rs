//! Spoken announcement of the run outcome through macOS `say`.
use crate::runner::{ToolInvocation, ToolRunner};

pub const SUCCESS_MESSAGE: &str = "The notarize operation succeeded.";
pub const FAILURE_MESSAGE: &str = "The notarize operation failed.";

/// Announce the outcome unless `quiet`. A failing `say` is only logged.
pub fn announce(runner: &mut dyn ToolRunner, succeeded: bool, quiet: bool) {
    if quiet {
        return;
    }
    let message = if succeeded {
        SUCCESS_MESSAGE
    } else {
        FAILURE_MESSAGE
    };
    match runner.run(&ToolInvocation::new("say").arg(message)) {
        Ok(output) if output.success() => {}
        Ok(output) => tracing::debug!(status = output.status, "say exited non-zero"),
        Err(err) => tracing::debug!(error = %format!("{err:#}"), "say unavailable"),
    }
}
