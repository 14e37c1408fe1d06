use std::{io, process::ExitCode};

use clap::Parser;
use moneywiz::{
    commands::{self, Outcome},
    config::{CliArgs, Config},
    logging,
};

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match commands::run(&cli, &config, &mut out) {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::ReferencesFound) => ExitCode::from(2),
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
