//! Shared test infrastructure for integration tests.
//!
//! `FakeRunner` stands in for xcrun, ditto and say; `Fixture` owns a
//! temporary directory holding the artifacts under test.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use notarize::runner::{ToolInvocation, ToolOutput, ToolRunner};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const NOTARYTOOL: &str = "/Applications/Xcode.app/Contents/Developer/usr/bin/notarytool";
pub const SUBMISSION_ID: &str = "4e7a9c52-8f5d-4b3f-9a63-2c7c1a1e0f11";
pub const REQUEST_UUID: &str = "2efe2717-52ef-43a5-96dc-0797e4ca1041";
pub const DUPLICATE_UUID: &str = "09039bec-35e9-4cf2-af2f-30a64ef33190";

/// Scripted tool runner. Responses are consumed in order; every call is
/// recorded. With `emulate_copies`, two-argument `ditto` calls copy files.
#[derive(Default)]
pub struct FakeRunner {
    responses: VecDeque<ToolOutput>,
    pub calls: Vec<ToolInvocation>,
    emulate_copies: bool,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emulate_copies(mut self) -> Self {
        self.emulate_copies = true;
        self
    }

    pub fn respond(&mut self, status: i32, text: &str) -> &mut Self {
        self.responses.push_back(ToolOutput {
            status,
            lines: text.lines().map(str::to_string).collect(),
        });
        self
    }

    pub fn verbs(&self) -> Vec<String> {
        self.calls.iter().map(ToolInvocation::verb).collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }

    fn copy(&self, invocation: &ToolInvocation) -> Result<()> {
        let [source, target] = invocation.args.as_slice() else {
            return Ok(());
        };
        let source = Path::new(source);
        let target = Path::new(target);
        if source.is_dir() {
            fs::create_dir_all(target)?;
        } else {
            let name = source
                .file_name()
                .ok_or_else(|| anyhow!("copy source has no file name"))?;
            fs::copy(source, target.join(name))?;
        }
        Ok(())
    }
}

impl ToolRunner for FakeRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        self.calls.push(invocation.clone());
        let output = self
            .responses
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected call: {}", invocation.display()))?;
        if self.emulate_copies && invocation.program == "ditto" && output.success() {
            self.copy(invocation)?;
        }
        Ok(output)
    }
}

/// Temporary directory with helpers to lay out artifacts.
pub struct Fixture {
    pub dir: TempDir,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            dir: TempDir::new().expect("create fixture dir"),
        }
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, b"artifact").expect("write artifact");
        path
    }

    pub fn app(&self, name: &str, bundle_id: Option<&str>) -> PathBuf {
        let app = self.path().join(name);
        let contents = app.join("Contents");
        fs::create_dir_all(&contents).expect("create bundle");
        if let Some(bundle_id) = bundle_id {
            fs::write(contents.join("Info.plist"), info_plist(bundle_id)).expect("write plist");
        }
        app
    }
}

pub fn info_plist(bundle_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleIdentifier</key>
	<string>{bundle_id}</string>
	<key>CFBundlePackageType</key>
	<string>APPL</string>
</dict>
</plist>"#
    )
}

pub fn altool_uploaded(request_uuid: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>notarization-upload</key>
	<dict>
		<key>RequestUUID</key>
		<string>{request_uuid}</string>
	</dict>
	<key>success-message</key>
	<string>No errors uploading.</string>
</dict>
</plist>"#
    )
}

pub fn altool_status(status: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>notarization-info</key>
	<dict>
		<key>RequestUUID</key>
		<string>{REQUEST_UUID}</string>
		<key>Status</key>
		<string>{status}</string>
	</dict>
</dict>
</plist>"#
    )
}

/// altool error output with leading diagnostic chatter.
pub fn altool_error(code: i64, message: &str) -> String {
    format!(
        r#"2024-05-02 10:11:12.345 altool[4242:1010] *** Error: {message}
<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>product-errors</key>
	<array>
		<dict>
			<key>code</key>
			<integer>{code}</integer>
			<key>message</key>
			<string>{message}</string>
		</dict>
	</array>
</dict>
</plist>"#
    )
}

pub fn notarytool_accepted(id: &str) -> String {
    format!(
        "Conducting pre-submission checks and initiating connection to the Apple notary service...\n\
         Submission ID received\n  id: {id}\n\
         Successfully uploaded file\n  id: {id}\n\
         Waiting for processing to complete.\n\
         Processing complete\n  id: {id}\n  status: Accepted"
    )
}

/// Run the compiled binary with a clean notarization environment.
pub fn run_notarize(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_notarize"));
    command
        .args(args)
        .env_remove("PACE_EDEN_NOTARIZE_DISABLE")
        .env_remove("RUST_LOG");
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("run notarize binary")
}
