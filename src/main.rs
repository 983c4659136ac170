use anyhow::Result;
use clap::Parser;
use notarize::cli::{RootArgs, EXAMPLES};
use notarize::error::{exit_code_for, NotarizeError, EXIT_FAILURE};
use notarize::report::write_report;
use notarize::retry::SystemClock;
use notarize::runner::{ProcessRunner, ToolRunner};
use notarize::settings::{Settings, DISABLE_ENV_VAR};
use notarize::workflow::Orchestrator;
use notarize::{logging, notify};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    if args.examples {
        println!("{EXAMPLES}");
        return ExitCode::SUCCESS;
    }
    if let Err(err) = logging::init(args.debug, args.log.as_deref()) {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let mut runner = ProcessRunner;
    let disable = std::env::var(DISABLE_ENV_VAR).ok();
    let settings = match Settings::from_args(&args, disable.as_deref()) {
        Ok(settings) => settings,
        // No validated settings yet; the raw flag decides the announcement.
        Err(err) => return fail(&mut runner, err.into(), args.quiet),
    };

    match run(&settings, &mut runner) {
        Ok(()) => {
            notify::announce(&mut runner, true, settings.quiet);
            ExitCode::SUCCESS
        }
        Err(err) => fail(&mut runner, err, settings.quiet),
    }
}

fn run(settings: &Settings, runner: &mut dyn ToolRunner) -> Result<()> {
    let report = Orchestrator::new(settings, &SystemClock).run(runner)?;
    if let Some(path) = &settings.report {
        write_report(path, &report)?;
        tracing::info!(path = %path.display(), "wrote run report");
    }
    Ok(())
}

fn fail(runner: &mut dyn ToolRunner, err: anyhow::Error, quiet: bool) -> ExitCode {
    if let Some(failure) = err.downcast_ref::<NotarizeError>() {
        for line in failure.captured_output() {
            tracing::info!("{line}");
        }
    }
    tracing::error!("{err:#}");
    notify::announce(runner, false, quiet);
    ExitCode::from(exit_code_for(&err))
}
