//! XIRR calculation from trade files

use crate::cashflow;
use crate::config::{AppConfig, SolverConfig};
use crate::error::Result;
use crate::import;
use crate::models::{Cashflow, TradeSource};
use crate::xirr;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

pub const FAILURE_MESSAGE: &str =
    "Unable to calculate XIRR using the Newton-Raphson method. Please try again or use a different set of data.";

/// XIRR result for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XirrReport {
    /// XIRR as decimal (0.0842 = 8.42%), `None` if the solver did not converge
    pub rate: Option<f64>,
    /// XIRR as percentage
    pub rate_percent: Option<f64>,
    pub iterations: Option<usize>,
    /// Number of cashflows including the terminal portfolio value
    pub cashflow_count: usize,
    pub first_date: Option<String>,
    pub evaluation_date: String,
    /// Sum of purchases (positive number)
    pub total_invested: f64,
    /// Sum of sales, excluding the portfolio value
    pub total_returned: f64,
    pub portfolio_value: f64,
    /// Why no rate was found
    pub failure: Option<String>,
}

impl XirrReport {
    pub fn converged(&self) -> bool {
        self.rate.is_some()
    }

    /// One-line summary, e.g. "Calculated XIRR: 8.42%"
    pub fn message(&self) -> String {
        match self.rate {
            Some(rate) => format!("Calculated XIRR: {:.2}%", rate * 100.0),
            None => FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Build cashflows from already-read sources and solve.
///
/// Invalid trade data is an error; a solver failure is reported inside the
/// returned report.
pub fn calculate_xirr(
    sources: &[TradeSource],
    portfolio_value: f64,
    as_of: NaiveDate,
    solver: &SolverConfig,
) -> Result<XirrReport> {
    let cashflows = cashflow::build_cashflows(sources, portfolio_value, as_of)?;
    log::info!("XIRR: Found {} cash flows", cashflows.len());

    let trades: &[Cashflow] = &cashflows[..cashflows.len() - 1];
    let total_invested: f64 = trades.iter().filter(|cf| cf.amount < 0.0).map(|cf| -cf.amount).sum();
    let total_returned: f64 = trades.iter().filter(|cf| cf.amount > 0.0).map(|cf| cf.amount).sum();
    let first_date = cashflows.iter().map(|cf| cf.date).min();

    let outcome = xirr::solve_with_fallback(&cashflows, &solver.options(), &solver.fallback_guesses);

    let (rate, iterations, failure) = match outcome {
        Ok(result) => {
            log::info!("XIRR converged to {:.6} after {} iterations", result.rate, result.iterations);
            (Some(result.rate), Some(result.iterations), None)
        }
        Err(err) => {
            log::warn!("XIRR did not converge: {}", err);
            (None, None, Some(err.to_string()))
        }
    };

    Ok(XirrReport {
        rate,
        rate_percent: rate.map(|r| r * 100.0),
        iterations,
        cashflow_count: cashflows.len(),
        first_date: first_date.map(|d| d.to_string()),
        evaluation_date: as_of.to_string(),
        total_invested,
        total_returned,
        portfolio_value,
        failure,
    })
}

/// Read trade files, build cashflows and solve.
pub fn calculate_xirr_from_files(
    paths: &[PathBuf],
    portfolio_value: f64,
    as_of: NaiveDate,
    config: &AppConfig,
) -> Result<XirrReport> {
    let sources = import::read_trade_files(paths, &config.import)?;
    calculate_xirr(&sources, portfolio_value, as_of, &config.solver)
}
