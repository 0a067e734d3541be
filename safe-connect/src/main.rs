//! Credential-safe database client launcher.
//!
//! This binary obtains a username and password from provider programs,
//! logs an interactive client in through its stdin and then hands the
//! terminal over to the user.
//!
//! # Security Guarantees
//! - Credentials never appear on a command line or in the environment
//! - Credential buffers are zeroed once the client has them
//! - No credentials are logged, even with `--debug`

use clap::Parser;
use safe_connect::{Cli, FileConfig, exit_status, load_file_config};
use safe_connect_core::{
    INTERNAL_EXIT_CODE, Session, SessionConfig, init_logging, install_fault_handlers,
};
use std::process::ExitCode;
use tracing::{debug, error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => match load_file_config(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return exit_status(INTERNAL_EXIT_CODE);
            }
        },
        None => FileConfig::default(),
    };

    let config = match cli.session_config(file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Usage error: {}", e);
            eprintln!("Use --help for usage information");
            return exit_status(INTERNAL_EXIT_CODE);
        }
    };

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet, config.debug) {
        eprintln!("Error: {}", e);
        return exit_status(INTERNAL_EXIT_CODE);
    }

    if let Err(e) = install_fault_handlers() {
        error!("{}", e);
        return exit_status(e.exit_code());
    }
    debug!("Starting {}", config);

    exit_status(run(&config))
}

/// Runs one session on a single-threaded runtime and returns its status.
fn run(config: &SessionConfig) -> i32 {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return INTERNAL_EXIT_CODE;
        }
    };

    let result = runtime.block_on(async {
        let mut session = Session::new(config)?;
        let mut input = tokio::io::stdin();
        session.run(&mut input).await
    });

    // A relay read may still be parked on the blocking stdin thread.
    runtime.shutdown_background();

    match result {
        Ok(outcome) => {
            info!(
                "Session finished in state {} with status {}",
                outcome.final_state, outcome.exit_code
            );
            outcome.exit_code
        }
        Err(e) => {
            let code = e.exit_code();
            error!("{:#}", anyhow::Error::new(e));
            code
        }
    }
}
