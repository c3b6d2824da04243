//! Gift exchange CLI for running draws against a session directory.
//!
//! This binary delegates to `gift_exchange::cli` for parsing and execution,
//! keeping the CLI behaviour testable without spawning a process.

use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use gift_exchange::DrawSettings;
use gift_exchange::cli::{CliError, ParseOutcome, parse_args, run, usage};
use ortho_config::OrthoConfig;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    match execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(write_err) = writeln!(io::stderr().lock(), "{err}") {
                drop(write_err);
            }
            ExitCode::FAILURE
        }
    }
}

fn execute() -> Result<(), CliError> {
    match parse_args(env::args().skip(1))? {
        ParseOutcome::Help => {
            write_stdout(usage());
            Ok(())
        }
        ParseOutcome::Options(options) => {
            let message = run(&options, load_settings())?;
            write_stdout(&message);
            Ok(())
        }
    }
}

/// Settings come from `GIFT_EXCHANGE_*` variables and config files only; the
/// command-line flags are parsed by [`parse_args`].
fn load_settings() -> DrawSettings {
    match DrawSettings::load_from_iter([OsString::from("gift-exchange")]) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "failed to load settings; using defaults");
            DrawSettings::default()
        }
    }
}

fn write_stdout(message: &str) {
    if let Err(err) = writeln!(io::stdout().lock(), "{}", message.trim_end()) {
        drop(err);
    }
}
