use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vault_organizer::cli::{Cli, run_cli};
use vault_organizer::output::OutputFormatter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_cli(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            if let Some(remedy) = e.remedy() {
                OutputFormatter::remedy(&remedy);
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never mix with reports or command output.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
