//! Tracing subscriber setup.
//!
//! Filter precedence: `--debug`, then `RUST_LOG`, then `info`. With `--log`
//! every event goes to that file (no ANSI) instead of the terminal.
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

pub fn init(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = filter(debug);
    match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(file_layer.with_filter(filter))
                .try_init()
                .context("install tracing subscriber")?;
        }
        None => {
            let terminal_layer = fmt::layer().with_target(false);
            tracing_subscriber::registry()
                .with(terminal_layer.with_filter(filter))
                .try_init()
                .context("install tracing subscriber")?;
        }
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("create log file {}", path.display()))
}
