//! Copying the artifact into the `--outdir` directory.
use crate::error::NotarizeError;
use crate::runner::{ToolInvocation, ToolRunner};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `artifact` into `outdir` with `ditto` and return the copy's path.
///
/// The directory is created when missing and an existing copy is removed
/// first. Bundles are copied to `<outdir>/<name>`; ditto copies files into
/// the directory itself.
pub fn copy_to_outdir(
    runner: &mut dyn ToolRunner,
    artifact: &Path,
    outdir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(outdir).with_context(|| format!("create {}", outdir.display()))?;
    let name = artifact
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", artifact.display()))?;
    let destination = outdir.join(name);

    if let Ok(metadata) = fs::symlink_metadata(&destination) {
        tracing::info!(path = %destination.display(), "deleting existing destination");
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&destination)
        } else {
            fs::remove_file(&destination)
        };
        removed.with_context(|| format!("remove {}", destination.display()))?;
    }

    tracing::info!(
        artifact = %artifact.display(),
        outdir = %outdir.display(),
        "copying to the output directory"
    );
    let target = if artifact.is_dir() {
        destination.as_path()
    } else {
        outdir
    };
    let output = runner.run(&ToolInvocation::new("ditto").path_arg(artifact).path_arg(target))?;
    if !output.success() {
        return Err(NotarizeError::Tool {
            action: format!("copying {} to {}", artifact.display(), outdir.display()),
            status: output.status,
            output: output.lines,
        }
        .into());
    }
    Ok(destination)
}
