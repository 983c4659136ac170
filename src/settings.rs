//! Run configuration resolved from CLI arguments and the environment.
//!
//! `Settings` is built once, validated up front, and passed by reference to
//! every step; nothing reads global flags.
use crate::cli::RootArgs;
use crate::error::NotarizeError;
use crate::job::Backend;
use crate::retry::RetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that disables submit, poll and staple.
pub const DISABLE_ENV_VAR: &str = "PACE_EDEN_NOTARIZE_DISABLE";

const TRUTHY_TOKENS: [&str; 4] = ["yes", "true", "on", "1"];

/// Whether an environment toggle value means "on".
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    TRUTHY_TOKENS.contains(&value.as_str())
}

/// How the run authenticates; also decides the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// altool with an Apple ID and app-specific password.
    AppSpecificPassword {
        username: String,
        password: String,
        asc_provider: Option<String>,
    },
    /// notarytool with a stored keychain profile.
    KeychainProfile { profile: String },
    /// notarytool with an Apple ID and team; prompts when no password is given.
    AppleId {
        username: String,
        team_id: String,
        password: Option<String>,
    },
}

impl Credentials {
    pub fn backend(&self) -> Backend {
        match self {
            Credentials::AppSpecificPassword { .. } => Backend::Legacy,
            Credentials::KeychainProfile { .. } | Credentials::AppleId { .. } => {
                Backend::Integrated
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub artifact: PathBuf,
    pub credentials: Credentials,
    /// Caller-supplied primary bundle ID (altool only).
    pub bundle_id: Option<String>,
    pub outdir: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub debug: bool,
    pub quiet: bool,
    pub notarization_disabled: bool,
    pub report: Option<PathBuf>,
}

impl Settings {
    /// Validate arguments. `disable_value` is the raw value of
    /// `DISABLE_ENV_VAR`, if set.
    pub fn from_args(
        args: &RootArgs,
        disable_value: Option<&str>,
    ) -> Result<Self, NotarizeError> {
        let artifact = resolve_artifact(args.file.as_deref())?;
        let credentials = resolve_credentials(args)?;
        let bundle_id = present(args.primary_bundle_id.as_deref());
        if credentials.backend() == Backend::Integrated && bundle_id.is_some() {
            return Err(NotarizeError::precondition(
                "notarytool does not accept a primary bundle ID; drop --primary-bundle-id",
            ));
        }

        let retry = RetryPolicy {
            interval: Duration::from_secs(args.poll_interval),
            max_attempts: args.max_attempts,
            max_wait: args.max_wait.map(Duration::from_secs),
        };

        Ok(Self {
            artifact,
            credentials,
            bundle_id,
            outdir: args.outdir.as_deref().map(strip_quotes_path),
            retry,
            debug: args.debug,
            quiet: args.quiet,
            notarization_disabled: disable_value.is_some_and(is_truthy),
            report: args.report.clone(),
        })
    }

    pub fn backend(&self) -> Backend {
        self.credentials.backend()
    }
}

fn resolve_artifact(file: Option<&Path>) -> Result<PathBuf, NotarizeError> {
    let Some(file) = file else {
        return Err(NotarizeError::precondition("specify the artifact to notarize with --file"));
    };
    let lossy = file.to_string_lossy();
    let raw = strip_quotes(&lossy);
    let trimmed = raw.trim_end_matches('/');
    let path = if trimmed.is_empty() {
        PathBuf::from(raw)
    } else {
        PathBuf::from(trimmed)
    };
    if path.as_os_str().is_empty() {
        return Err(NotarizeError::precondition("invalid --file path: empty"));
    }
    if !path.exists() {
        return Err(NotarizeError::precondition(format!(
            "required --file path does not exist: {}",
            path.display()
        )));
    }
    Ok(path)
}

fn resolve_credentials(args: &RootArgs) -> Result<Credentials, NotarizeError> {
    let username = present(args.username.as_deref());
    let password = present(args.password.as_deref());
    let team_id = present(args.team_id.as_deref());
    let keychain_profile = args.keychain_profile.as_deref();

    if let Some(profile) = keychain_profile {
        let Some(profile) = present(Some(profile)) else {
            return Err(NotarizeError::precondition("specify a valid --keychain-profile"));
        };
        if args.team_id.is_some() {
            return Err(NotarizeError::precondition(
                "--team-id and --keychain-profile cannot be used together",
            ));
        }
        return Ok(Credentials::KeychainProfile { profile });
    }

    if args.team_id.is_some() {
        let Some(team_id) = team_id else {
            return Err(NotarizeError::precondition("specify a valid --team-id"));
        };
        let Some(username) = username else {
            return Err(NotarizeError::precondition("specify a valid --username"));
        };
        if password.is_none() {
            tracing::warn!(
                "no app-specific password given for notarytool; it will prompt for one at upload time"
            );
        }
        return Ok(Credentials::AppleId {
            username,
            team_id,
            password,
        });
    }

    let Some(username) = username else {
        return Err(NotarizeError::precondition("specify a valid --username"));
    };
    let Some(password) = password else {
        return Err(NotarizeError::precondition("specify a valid --password"));
    };
    Ok(Credentials::AppSpecificPassword {
        username,
        password,
        asc_provider: present(args.asc_provider.as_deref()),
    })
}

/// Treat empty strings and an empty quoted pair as "not given".
fn present(value: Option<&str>) -> Option<String> {
    let value = strip_quotes(value?.trim());
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn strip_quotes(value: &str) -> &str {
    let Some(inner) = value
        .strip_prefix('"')
        .or_else(|| value.strip_prefix('\''))
    else {
        return value;
    };
    inner
        .strip_suffix('"')
        .or_else(|| inner.strip_suffix('\''))
        .unwrap_or(inner)
}

fn strip_quotes_path(path: &Path) -> PathBuf {
    PathBuf::from(strip_quotes(&path.to_string_lossy()))
}
