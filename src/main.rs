//! Compute the XIRR of one or more trade exports plus the current portfolio value.
//!
//! Run with: cargo run -- --value 12500 trades-2023.xlsx trades-2024.csv

use clap::Parser;
use portfolio_xirr::cli::{execute, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    ExitCode::from(execute(&cli, &mut std::io::stdout(), &mut std::io::stderr()))
}
