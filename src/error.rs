//! Error types for cashflow building, trade import and the XIRR solver.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Result using the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid trade data: {0}")]
    Validation(#[from] DataValidationError),

    /// Lets library callers write `xirr::solve(..)?` in functions returning
    /// [`Result`]. `calculate_xirr` keeps solver failures inside the report
    /// instead and never returns this variant.
    #[error("XIRR did not converge: {0}")]
    NoConvergence(#[from] NoConvergence),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Malformed or missing trade record fields.
///
/// Raised as soon as the first bad row is seen; nothing is coerced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataValidationError {
    #[error("{source_name} row {row}: missing '{field}'")]
    MissingField {
        source_name: String,
        row: usize,
        field: &'static str,
    },

    #[error("{source_name} row {row}: '{field}' is not a number: '{value}'")]
    NotNumeric {
        source_name: String,
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("{source_name} row {row}: invalid trade date '{value}'")]
    InvalidDate {
        source_name: String,
        row: usize,
        value: String,
    },

    #[error("{source_name} row {row}: unknown trade type '{value}' (expected buy or sell)")]
    UnknownTradeType {
        source_name: String,
        row: usize,
        value: String,
    },

    #[error("portfolio value must be a finite, non-negative number, got {0}")]
    InvalidPortfolioValue(f64),
}

/// The solver could not produce a rate.
///
/// Callers should treat this as "no rate found" and may retry with another guess.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoConvergence {
    #[error("need at least two cashflows, got {0}")]
    TooFewCashflows(usize),

    #[error("cashflows need at least one negative and one positive amount")]
    NoSignChange,

    #[error("cashflow amount is not finite")]
    NonFiniteCashflow,

    #[error("initial guess {0} is outside the valid domain (rate > -1)")]
    InvalidGuess(f64),

    #[error("NPV is undefined at rate {rate} (iteration {iteration})")]
    InvalidDomain { iteration: usize, rate: f64 },

    #[error("derivative vanished at rate {rate} (iteration {iteration})")]
    ZeroDerivative { iteration: usize, rate: f64 },

    #[error("iteration diverged to rate {rate} (iteration {iteration})")]
    Diverged { iteration: usize, rate: f64 },

    #[error("no root within {0} iterations")]
    IterationLimit(usize),

    #[error("deadline exceeded after {0} iterations")]
    DeadlineExceeded(usize),
}

/// Failures reading uploaded trade files.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("No files or portfolio value provided")]
    NoInput,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("File type not allowed: {} (expected {})", .path.display(), .allowed.join(", "))]
    NotAllowed { path: PathBuf, allowed: Vec<String> },

    #[error("delimiter {0:?} is not a single-byte ASCII character")]
    InvalidDelimiter(char),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed file {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed spreadsheet {}: {source}", .path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("{}: workbook has no worksheet", .0.display())]
    EmptyWorkbook(PathBuf),

    #[error("{}: no header row after skipping {skip_rows} rows", .path.display())]
    MissingHeader { path: PathBuf, skip_rows: usize },

    #[error("{}: missing columns {}", .path.display(), .columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },
}

/// Failures loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}
