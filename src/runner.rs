//! Synchronous execution of the vendor command line tools.
//!
//! Every external call (xcrun, ditto, say) goes through `ToolRunner` so the
//! orchestration can be driven by scripted output in tests.
use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

const REDACTED: &str = "******";

/// One external command, built without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Echo output lines to the terminal as they arrive.
    pub echo: bool,
    secret: Vec<usize>,
}

impl ToolInvocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            echo: false,
            secret: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Append an argument that must never appear in logs.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Program plus first argument, e.g. `xcrun altool`.
    pub fn verb(&self) -> String {
        match self.args.first() {
            Some(first) => format!("{} {}", self.program, first),
            None => self.program.clone(),
        }
    }

    /// Shell-quoted command line with secrets masked.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        for (idx, arg) in self.args.iter().enumerate() {
            if self.secret.contains(&idx) {
                words.push(REDACTED);
            } else {
                words.push(arg.as_str());
            }
        }
        shell_words::join(words)
    }
}

/// Exit status and combined output of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub status: i32,
    /// Output lines with line endings stripped. Diagnostic (stderr) lines
    /// precede stdout lines when both were captured.
    pub lines: Vec<String>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait ToolRunner {
    /// Run the command to completion. Errors only when the command could not
    /// be started; a non-zero exit is reported through `ToolOutput::status`.
    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Runs tools as child processes resolved on `PATH`.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        let program = which::which(&invocation.program)
            .with_context(|| format!("locate {} on PATH", invocation.program))?;
        tracing::debug!(command = %invocation.display(), "run tool");

        let start = Instant::now();
        let mut command = Command::new(&program);
        command.args(&invocation.args).stdin(Stdio::null());
        let output = if invocation.echo {
            run_echoing(&mut command)
        } else {
            run_captured(&mut command)
        }
        .with_context(|| format!("run {}", invocation.verb()))?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = output.status,
            lines = output.lines.len(),
            "tool finished"
        );
        Ok(output)
    }
}

fn run_captured(command: &mut Command) -> Result<ToolOutput> {
    let output = command.output().context("spawn tool")?;
    let mut lines = split_lines(&output.stderr);
    lines.extend(split_lines(&output.stdout));
    Ok(ToolOutput {
        status: exit_code(&output.status),
        lines,
    })
}

// Both streams are echoed live and kept; stderr lines follow stdout lines.
fn run_echoing(command: &mut Command) -> Result<ToolOutput> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn().context("spawn tool")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("tool stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("tool stderr was not captured"))?;

    let (mut lines, errors) = std::thread::scope(|scope| -> Result<_> {
        let errors = scope.spawn(move || echo_lines(stderr, |line| eprintln!("{line}")));
        let lines = echo_lines(stdout, |line| println!("{line}"))?;
        let errors = errors
            .join()
            .map_err(|_| anyhow!("tool stderr reader panicked"))??;
        Ok((lines, errors))
    })?;
    lines.extend(errors);

    let status = child.wait().context("wait for tool")?;
    Ok(ToolOutput {
        status: exit_code(&status),
        lines,
    })
}

fn echo_lines(stream: impl Read, echo: impl Fn(&str)) -> Result<Vec<String>> {
    let mut reader = BufReader::new(stream);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).context("read tool output")?;
        if read == 0 {
            break;
        }
        let line = decode_line(&buf);
        echo(&line);
        lines.push(line);
    }
    Ok(lines)
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }
    bytes
        .split_inclusive(|byte| *byte == b'\n')
        .map(decode_line)
        .collect()
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
