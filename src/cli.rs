//! CLI argument parsing for the notarize command.
//!
//! Only raw options are collected here; validation and backend selection
//! live in `settings`.
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug, Default)]
#[command(
    name = "notarize",
    version,
    about = "Notarize software with Apple's notary service and staple the result",
    long_about = "Uploads a package (dmg, zip, pkg) or a bundle (.app, .framework) to Apple's notary \
service and waits until the notarization succeeds or fails. Bundles are zipped into a temporary \
archive before upload. On success the package or bundle is stapled in place, or copied to --outdir \
and stapled there. Supplying --team-id or --keychain-profile selects notarytool; otherwise the \
deprecated altool is used.\n\nSet PACE_EDEN_NOTARIZE_DISABLE to YES, TRUE, ON or 1 (case \
insensitive) to skip notarization; the copy to --outdir still happens."
)]
pub struct RootArgs {
    /// Show examples of how to use this command
    #[arg(short = 'x', long)]
    pub examples: bool,

    /// Package or bundle to notarize (dmg, zip, pkg, app, framework)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Apple ID used to notarize
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// App-specific password; altool also accepts @env:VAR or @keychain:NAME
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Team ID; selects notarytool and requires --username
    #[arg(short = 't', long, value_name = "TEAM")]
    pub team_id: Option<String>,

    /// Keychain profile stored with `notarytool store-credentials`; selects notarytool
    #[arg(short = 'k', long, value_name = "PROFILE")]
    pub keychain_profile: Option<String>,

    /// Primary bundle ID for altool; discovered from the bundle when omitted
    #[arg(long, value_name = "ID")]
    pub primary_bundle_id: Option<String>,

    /// Provider short name for accounts associated with multiple providers (altool)
    #[arg(long, value_name = "PROVIDER")]
    pub asc_provider: Option<String>,

    /// Copy the notarized artifact here and staple the copy
    #[arg(short = 'o', long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Write all output to this log file
    #[arg(short = 'l', long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Skip the spoken success/failure announcement
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose diagnostics, including redacted tool command lines
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Seconds to wait between status checks and staple retries
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Give up after this many status checks or staple attempts
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Give up waiting for a verdict or ticket after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_wait: Option<u64>,

    /// Write a machine-readable JSON run report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

pub const EXAMPLES: &str = "\
Examples of notarize usage:

Save your notarization credentials to the keychain under the name 'notarization' using Apple's
notarytool. You will be prompted for your app-specific password once per system:

  xcrun notarytool store-credentials notarization --apple-id johndoe@mycompany.com --team-id TBLAHBLAH

---------------------------------------------------------------------------------------------------

Notarize an application with notarytool using the stored keychain profile, copying the stapled
result to a separate output directory:

  notarize --keychain-profile notarization --file MyFavoriteApp.app --outdir build/notarized

---------------------------------------------------------------------------------------------------

Notarize an installer package with notarytool, stapling the input pkg in place:

  notarize --keychain-profile notarization -f MyFavoriteApp.pkg

---------------------------------------------------------------------------------------------------

Notarize an application with notarytool using an Apple ID and team ID. Without a password the
vendor tool prompts for one at upload time:

  notarize --username johndoe@mycompany.com --team-id TBLAHBLAH --file MyFavoriteApp.app

---------------------------------------------------------------------------------------------------

Notarize an application with the deprecated altool, reading the password from the keychain and
using the bundle's own identifier as the primary bundle ID:

  notarize --username johndoe@mycompany.com --password @keychain:notarization --file MyFavoriteApp.app --outdir build/notarized

---------------------------------------------------------------------------------------------------

Notarize a disk image with the deprecated altool:

  notarize -u johndoe@mycompany.com -p @keychain:notarization --primary-bundle-id com.mycompany.dmg.MyFavoriteApp -f MyFavoriteApp.dmg -o build/notarized
";

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn parses_short_options() {
        let args = RootArgs::try_parse_from([
            "notarize", "-k", "notarization", "-f", "MyApp.app", "-o", "out", "-q", "-d",
        ])
        .expect("parse");
        assert_eq!(args.keychain_profile.as_deref(), Some("notarization"));
        assert_eq!(args.file, Some(PathBuf::from("MyApp.app")));
        assert_eq!(args.outdir, Some(PathBuf::from("out")));
        assert!(args.quiet);
        assert!(args.debug);
        assert_eq!(args.poll_interval, 30);
        assert_eq!(args.max_attempts, None);
    }

    #[test]
    fn parses_retry_bounds() {
        let args = RootArgs::try_parse_from([
            "notarize",
            "--file",
            "MyApp.pkg",
            "--poll-interval",
            "5",
            "--max-attempts",
            "12",
            "--max-wait",
            "3600",
        ])
        .expect("parse");
        assert_eq!(args.poll_interval, 5);
        assert_eq!(args.max_attempts, Some(12));
        assert_eq!(args.max_wait, Some(3600));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = RootArgs::try_parse_from(["notarize", "-f", "MyApp.pkg", "--poll-interval", "0"])
            .expect_err("zero interval");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
