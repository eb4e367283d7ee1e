pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod settings;
pub mod validation;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use error::AppError;

/// Parse the command line, run the command, and print its JSON result on stdout.
pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();

    logging::init(cli.log_format());
    if let Some(dir) = &cli.crash_dir {
        logging::install_crash_hook(dir);
    }

    tracing::info!("Starting option-sync v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let err = AppError::from(e);
            tracing::error!(error = %err, "Failed to start async runtime");
            print_json(&err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::execute(cli.command)) {
        Ok(output) => {
            print_json(&output.body);
            if output.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind(), "Command failed");
            print_json(&e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render output: {e}"),
    }
}
