//! `careweave`: index a local clinical corpus, answer questions over it, and evaluate answers.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use cw_core::error::AppError;
use tracing::info_span;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let settings = cli.settings.into_settings()?;
    init_tracing(cli.verbose || settings.debug);
    let span = info_span!("careweave", app = %settings.app_name);
    let _enter = span.enter();

    let choice = cli.backend.into();
    match cli.command {
        Commands::Index => commands::index::run(&settings, choice),
        Commands::Ask {
            question,
            top_k,
            session_id,
            request_id,
        } => commands::ask::run(
            &settings,
            choice,
            commands::ask::AskArgs {
                question,
                top_k,
                session_id,
                request_id,
            },
        ),
        Commands::Eval { n } => commands::eval::run(&settings, choice, n),
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins unless verbose.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
