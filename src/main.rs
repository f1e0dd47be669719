//! `helmgen` command-line entry point.

use std::process;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use helmgen::{Cli, HelmgenError, RunRequest, run, settings};

fn main() {
    let request = Cli::parse().into_request();
    init_logging(request.debug);

    if let Err(e) = execute(&request) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(request: &RunRequest) -> Result<(), HelmgenError> {
    let settings = settings::load(request.settings_file.as_deref(), request.overrides.clone())?;
    if request.debug {
        debug!(settings = %run::to_json(&settings)?, "resolved settings");
    }
    let store = run::open_store(&settings)?;
    let context = run::build_context(request, &settings, store)?;

    if request.debug {
        println!("{}", run::to_json(&context)?);
    }

    let report = run::render_all(&settings, &context)?;
    println!("{report}");
    Ok(())
}
