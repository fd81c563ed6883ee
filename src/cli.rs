//! Command line front end.
//!
//! Exit codes:
//!
//! ```text
//! 0  a rate was found
//! 2  the solver did not converge (the failure message is printed)
//! 1  any other error (bad input, unreadable file, invalid trade data)
//! ```

use crate::commands::xirr::{calculate_xirr_from_files, XirrReport};
use crate::config::AppConfig;
use crate::error::ImportError;
use crate::import::check_upload;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

pub const EXIT_SOLVED: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_NOT_CONVERGED: u8 = 2;

/// Money-weighted annualized return (XIRR) from brokerage trade exports
#[derive(Debug, Parser)]
#[command(name = "portfolio-xirr", version, about)]
pub struct Cli {
    /// Trade export files (.xlsx or .csv, header row after the statement preamble)
    pub files: Vec<PathBuf>,

    /// Current portfolio value
    #[arg(short = 'v', long = "value")]
    pub portfolio_value: Option<f64>,

    /// Starting guess for the solver as decimal (0.1 = 10%)
    #[arg(long, allow_negative_numbers = true)]
    pub guess: Option<f64>,

    /// Valuation date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log solver iterations
    #[arg(long)]
    pub verbose: bool,
}

/// Validate the arguments, read the files and solve.
pub fn run(cli: &Cli) -> Result<XirrReport> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(guess) = cli.guess {
        config.solver.guess = guess;
        config.validate()?;
    }

    let portfolio_value = match cli.portfolio_value {
        Some(value) if !cli.files.is_empty() => value,
        _ => return Err(ImportError::NoInput.into()),
    };
    // every name is checked before any file is read
    for file in &cli.files {
        check_upload(file, &config.import)?;
    }

    let as_of = cli.as_of.unwrap_or_else(|| Local::now().date_naive());
    Ok(calculate_xirr_from_files(&cli.files, portfolio_value, as_of, &config)?)
}

/// The report as printed: the one-line message, or pretty JSON with `--json`.
pub fn render(cli: &Cli, report: &XirrReport) -> Result<String> {
    if cli.json {
        Ok(serde_json::to_string_pretty(report)?)
    } else {
        Ok(report.message())
    }
}

/// Run the command, print to `out` / `err` and return the process exit code.
pub fn execute(cli: &Cli, out: &mut impl Write, err: &mut impl Write) -> u8 {
    let result = run(cli).and_then(|report| {
        writeln!(out, "{}", render(cli, &report)?)?;
        Ok(report)
    });

    match result {
        Ok(report) if report.converged() => EXIT_SOLVED,
        Ok(_) => EXIT_NOT_CONVERGED,
        Err(e) => {
            let _ = writeln!(err, "Error: {:#}", e);
            EXIT_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::xirr::FAILURE_MESSAGE;
    use std::path::Path;
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
        config: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = dir.path().join("config.json");
            std::fs::write(&config, r#"{ "import": { "skipRows": 0 } }"#).unwrap();
            Self { dir, config }
        }

        fn file(&self, name: &str, body: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path
        }

        fn cli(&self, args: &[&str], files: &[&Path]) -> Cli {
            let mut argv: Vec<String> = vec!["portfolio-xirr".into(), "--config".into(), self.config.display().to_string()];
            argv.extend(args.iter().map(|a| a.to_string()));
            argv.extend(files.iter().map(|f| f.display().to_string()));
            Cli::try_parse_from(argv).unwrap()
        }
    }

    fn execute_captured(cli: &Cli) -> (u8, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = execute(cli, &mut out, &mut err);
        (code, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    const BUY_ONLY: &str = "Trade Date,Quantity,Price,Trade Type\n2023-01-01,10,10,buy\n";

    // ==================== Exit codes ====================

    #[test]
    fn test_rate_found_exits_zero() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);
        let cli = ws.cli(&["--value", "110", "--as-of", "2024-01-01"], &[&trades]);

        let (code, out, err) = execute_captured(&cli);

        assert_eq!(code, EXIT_SOLVED, "Expected exit 0, got {} ({})", code, err);
        assert_eq!(out, "Calculated XIRR: 10.00%\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_no_convergence_exits_two() {
        let ws = Workspace::new();
        let trades = ws.file("sells.csv", "Trade Date,Quantity,Price,Trade Type\n2023-01-01,1,5,sell\n");
        let cli = ws.cli(&["--value", "20", "--as-of", "2024-01-01"], &[&trades]);

        let (code, out, _) = execute_captured(&cli);

        assert_eq!(code, EXIT_NOT_CONVERGED, "Expected exit 2, got {}", code);
        assert_eq!(out.trim_end(), FAILURE_MESSAGE);
    }

    #[test]
    fn test_invalid_trade_data_exits_one() {
        let ws = Workspace::new();
        let trades = ws.file("bad.csv", "Trade Date,Quantity,Price,Trade Type\n2023-01-01,ten,10,buy\n");
        let cli = ws.cli(&["--value", "110", "--as-of", "2024-01-01"], &[&trades]);

        let (code, out, err) = execute_captured(&cli);

        assert_eq!(code, EXIT_ERROR, "Expected exit 1, got {}", code);
        assert!(out.is_empty());
        assert!(err.contains("bad.csv row 2"), "got {}", err);
    }

    // ==================== Input checks ====================

    #[test]
    fn test_missing_value_or_files() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);

        for cli in [ws.cli(&[], &[&trades]), ws.cli(&["--value", "110"], &[])] {
            let (code, _, err) = execute_captured(&cli);
            assert_eq!(code, EXIT_ERROR);
            assert_eq!(err, "Error: No files or portfolio value provided\n");
        }
    }

    #[test]
    fn test_disallowed_extension_is_rejected_before_reading() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);
        let report = ws.dir.path().join("report.pdf");
        let cli = ws.cli(&["--value", "110"], &[&trades, &report]);

        let (code, out, err) = execute_captured(&cli);

        assert_eq!(code, EXIT_ERROR);
        assert!(out.is_empty());
        assert!(err.contains("File type not allowed"), "got {}", err);
        assert!(err.contains("report.pdf"), "got {}", err);
        assert!(err.contains("(expected xlsx, csv)"), "got {}", err);
    }

    #[test]
    fn test_invalid_guess_is_rejected() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);
        let cli = ws.cli(&["--value", "110", "--guess", "-2"], &[&trades]);

        assert_eq!(cli.guess, Some(-2.0));
        let (code, _, err) = execute_captured(&cli);

        assert_eq!(code, EXIT_ERROR);
        assert!(err.contains("solver.guess"), "got {}", err);
    }

    #[test]
    fn test_guess_override_is_used() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);
        let cli = ws.cli(&["--value", "110", "--as-of", "2024-01-01", "--guess", "0.5"], &[&trades]);

        let report = run(&cli).unwrap();

        assert!((report.rate.unwrap() - 0.10).abs() < 1e-6);
    }

    #[test]
    fn test_unreadable_config_exits_one() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);
        let missing = ws.dir.path().join("missing.json");
        let cli = Cli::try_parse_from([
            "portfolio-xirr".to_string(),
            "--config".to_string(),
            missing.display().to_string(),
            "--value".to_string(),
            "110".to_string(),
            trades.display().to_string(),
        ])
        .unwrap();

        let (code, _, err) = execute_captured(&cli);

        assert_eq!(code, EXIT_ERROR);
        assert!(err.starts_with("Error: Failed to load configuration"), "got {}", err);
    }

    // ==================== Output ====================

    #[test]
    fn test_json_output() {
        let ws = Workspace::new();
        let trades = ws.file("trades.csv", BUY_ONLY);
        let cli = ws.cli(&["--value", "110", "--as-of", "2024-01-01", "--json"], &[&trades]);

        let (code, out, _) = execute_captured(&cli);
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(code, EXIT_SOLVED);
        assert_eq!(json["cashflowCount"], 2);
        assert_eq!(json["evaluationDate"], "2024-01-01");
        assert!((json["rate"].as_f64().unwrap() - 0.10).abs() < 1e-6);
    }
}
