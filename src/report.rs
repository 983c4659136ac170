//! Machine-readable summary of a finished run (`--report`).
use crate::job::{Backend, Verdict};
use crate::staple::StapleOutcome;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub artifact: PathBuf,
    pub backend: Backend,
    pub notarization_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub already_submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Where the artifact was copied with `--outdir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_copy: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staple: Option<StapleOutcome>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(artifact: PathBuf, backend: Backend, notarization_disabled: bool) -> Self {
        Self {
            artifact,
            backend,
            notarization_disabled,
            job_id: None,
            already_submitted: false,
            verdict: None,
            output_copy: None,
            staple: None,
            elapsed_ms: 0,
        }
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let text = serde_json::to_string_pretty(report).context("serialize run report")?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir {}", parent.display()))?;
    }
    std::fs::write(path, format!("{text}\n").as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
