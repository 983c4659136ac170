//! Package preparation: flat files pass through, bundles are zipped.
//!
//! A bundle is archived with `ditto` into a fresh temporary directory owned by
//! the returned `PreparedPackage`; dropping it removes the archive whatever
//! happened in between.
use crate::error::NotarizeError;
use crate::job::Backend;
use crate::runner::{ToolInvocation, ToolRunner};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BUNDLE_ID_KEY: &str = "CFBundleIdentifier";
const FRAMEWORK_EXTENSION: &str = "framework";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// dmg, pkg, zip or any other regular file.
    File,
    /// Directory bundle carrying `Contents/Info.plist`, e.g. an `.app`.
    Bundle,
    /// `.framework` directory; archived but never inspected for an identifier.
    Framework,
}

impl ArtifactKind {
    pub fn of(path: &Path) -> Self {
        if !path.is_dir() {
            return ArtifactKind::File;
        }
        if has_extension(path, FRAMEWORK_EXTENSION) {
            ArtifactKind::Framework
        } else {
            ArtifactKind::Bundle
        }
    }

    pub fn is_directory(self) -> bool {
        !matches!(self, ArtifactKind::File)
    }
}

/// What the submission step uploads.
#[derive(Debug)]
pub struct PreparedPackage {
    pub submission_path: PathBuf,
    pub bundle_id: Option<String>,
    archive: Option<TempDir>,
}

impl PreparedPackage {
    pub fn is_archived(&self) -> bool {
        self.archive.is_some()
    }

    /// Remove the temporary archive now, reporting failures.
    pub fn cleanup(self) -> Result<()> {
        if let Some(dir) = self.archive {
            let path = dir.path().to_path_buf();
            dir.close()
                .with_context(|| format!("remove temporary archive dir {}", path.display()))?;
        }
        Ok(())
    }
}

pub fn prepare(
    runner: &mut dyn ToolRunner,
    artifact: &Path,
    backend: Backend,
    requested_id: Option<&str>,
) -> Result<PreparedPackage> {
    let kind = ArtifactKind::of(artifact);
    let mut bundle_id = requested_id.map(str::to_string);

    if backend == Backend::Legacy && kind == ArtifactKind::Bundle {
        let discovered = discover_bundle_id(artifact)?;
        bundle_id = Some(resolve_bundle_id(requested_id, discovered));
    }
    if backend == Backend::Legacy && bundle_id.is_none() {
        return Err(NotarizeError::precondition("specify a valid --primary-bundle-id").into());
    }

    if !kind.is_directory() {
        return Ok(PreparedPackage {
            submission_path: artifact.to_path_buf(),
            bundle_id,
            archive: None,
        });
    }

    let dir = TempDir::new().context("create temporary archive dir")?;
    let zip_path = dir.path().join(archive_name(artifact));
    tracing::info!(archive = %zip_path.display(), "zipping bundle for upload");
    let invocation = ToolInvocation::new("ditto")
        .args(["-ck", "--rsrc", "--sequesterRsrc", "--keepParent"])
        .path_arg(artifact)
        .path_arg(&zip_path);
    let output = runner.run(&invocation)?;
    if !output.success() {
        return Err(NotarizeError::Tool {
            action: format!("zipping {}", artifact.display()),
            status: output.status,
            output: output.lines,
        }
        .into());
    }

    Ok(PreparedPackage {
        submission_path: zip_path,
        bundle_id,
        archive: Some(dir),
    })
}

/// `CFBundleIdentifier` from the bundle's `Contents/Info.plist`.
pub fn discover_bundle_id(bundle: &Path) -> Result<String> {
    let plist_path = bundle.join("Contents").join("Info.plist");
    if !plist_path.is_file() {
        return Err(NotarizeError::precondition(format!(
            "{} does not appear to be a bundle: no Contents/Info.plist",
            bundle.display()
        ))
        .into());
    }
    let value = plist::Value::from_file(&plist_path)
        .with_context(|| format!("read {}", plist_path.display()))?;
    value
        .as_dictionary()
        .and_then(|dict| dict.get(BUNDLE_ID_KEY))
        .and_then(plist::Value::as_string)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            NotarizeError::precondition(format!(
                "{} has no {BUNDLE_ID_KEY}",
                plist_path.display()
            ))
            .into()
        })
}

fn resolve_bundle_id(requested: Option<&str>, discovered: String) -> String {
    match requested {
        Some(requested) if requested != discovered => {
            tracing::warn!(
                requested,
                discovered = %discovered,
                "bundle ID differs from the bundle's own; using the requested one. \
                 Omit --primary-bundle-id to use the bundle's identifier"
            );
            requested.to_string()
        }
        _ => {
            tracing::info!(bundle_id = %discovered, "using discovered bundle ID");
            discovered
        }
    }
}

fn archive_name(artifact: &Path) -> String {
    let name = artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    format!("{name}.zip")
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}
