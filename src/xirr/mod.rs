//! XIRR solver
//!
//! Finds the annualized rate r where the net present value of an irregular
//! cashflow series is zero:
//!
//! ```text
//! NPV(r) = Σ CF_i / (1 + r)^t_i = 0
//!
//! Where:
//!   CF_i = Cash flow i (negative = money invested, positive = money received)
//!   t_i  = (date_i - earliest date) in days / 365.0
//!   r    = XIRR (the rate we're solving for)
//!
//! Newton-Raphson iteration:
//!   r_new = r_old - NPV(r_old) / NPV'(r_old)
//!
//! Where NPV' is the derivative:
//!   NPV'(r) = Σ -t_i × CF_i / (1 + r)^(t_i + 1)
//! ```
//!
//! The anchor date is the earliest date in the series, whatever position it
//! has in the slice. NPV is only defined for r > -1; a step that would leave
//! that domain is damped to the midpoint between the current rate and -1.
//!
//! Every way the iteration can fail is reported as [`NoConvergence`].

use crate::error::NoConvergence;
use crate::models::{Cashflow, IrrResult};
use std::time::{Duration, Instant};

/// Days per year used for discounting
const DAYS_PER_YEAR: f64 = 365.0;
/// Below this |NPV'| the Newton step is meaningless
const MIN_DERIVATIVE: f64 = 1e-12;
/// Iterates beyond ±MAX_RATE are treated as divergence
const MAX_RATE: f64 = 1e6;

pub const DEFAULT_GUESS: f64 = 0.1;
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Solver tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Starting rate as decimal (0.1 = 10%)
    pub guess: f64,
    pub max_iterations: usize,
    /// Converged when |NPV(r)| falls below this
    pub npv_tolerance: f64,
    /// Converged when the Newton step falls below this
    pub step_tolerance: f64,
    /// Abort with [`NoConvergence::DeadlineExceeded`] once this instant has passed
    pub deadline: Option<Instant>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            guess: DEFAULT_GUESS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            npv_tolerance: 1e-9,
            step_tolerance: 1e-12,
            deadline: None,
        }
    }
}

impl SolverOptions {
    pub fn with_guess(mut self, guess: f64) -> Self {
        self.guess = guess;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// Convert cashflows to (amount, years since earliest date) pairs.
fn year_fractions(cashflows: &[Cashflow]) -> Vec<(f64, f64)> {
    let Some(anchor) = cashflows.iter().map(|cf| cf.date).min() else {
        return Vec::new();
    };

    cashflows
        .iter()
        .map(|cf| {
            let years = (cf.date - anchor).num_days() as f64 / DAYS_PER_YEAR;
            (cf.amount, years)
        })
        .collect()
}

/// Calculate NPV and its derivative for Newton-Raphson
fn npv_and_derivative(series: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;

    for (cf, years) in series {
        let discount = (1.0 + rate).powf(*years);
        npv += cf / discount;
        dnpv -= years * cf / (discount * (1.0 + rate));
    }

    (npv, dnpv)
}

/// Net present value of `cashflows` at `rate`, discounted to the earliest date.
///
/// `None` for an empty series or a rate outside the domain (rate <= -1).
pub fn xnpv(rate: f64, cashflows: &[Cashflow]) -> Option<f64> {
    if cashflows.is_empty() || !rate.is_finite() || rate <= -1.0 {
        return None;
    }
    let (npv, _) = npv_and_derivative(&year_fractions(cashflows), rate);
    npv.is_finite().then_some(npv)
}

/// Solve for the XIRR of `cashflows`.
pub fn solve(cashflows: &[Cashflow], options: &SolverOptions) -> Result<IrrResult, NoConvergence> {
    if cashflows.len() < 2 {
        return Err(NoConvergence::TooFewCashflows(cashflows.len()));
    }
    if cashflows.iter().any(|cf| !cf.amount.is_finite()) {
        return Err(NoConvergence::NonFiniteCashflow);
    }

    let has_negative = cashflows.iter().any(|cf| cf.amount < 0.0);
    let has_positive = cashflows.iter().any(|cf| cf.amount > 0.0);
    if !has_negative || !has_positive {
        return Err(NoConvergence::NoSignChange);
    }

    if !options.guess.is_finite() || options.guess <= -1.0 {
        return Err(NoConvergence::InvalidGuess(options.guess));
    }

    let series = year_fractions(cashflows);
    let mut rate = options.guess;

    for iteration in 0..options.max_iterations {
        if options.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(NoConvergence::DeadlineExceeded(iteration));
        }

        let (npv, dnpv) = npv_and_derivative(&series, rate);
        if !npv.is_finite() || !dnpv.is_finite() {
            return Err(NoConvergence::InvalidDomain { iteration, rate });
        }

        log::debug!("XIRR iteration {}: rate={:.10} npv={:.6e} dnpv={:.6e}", iteration, rate, npv, dnpv);

        if npv.abs() < options.npv_tolerance {
            return Ok(IrrResult {
                rate,
                iterations: iteration,
                npv,
            });
        }

        if dnpv.abs() < MIN_DERIVATIVE {
            return Err(NoConvergence::ZeroDerivative { iteration, rate });
        }

        let mut next = rate - npv / dnpv;
        let damped = next <= -1.0;
        if damped {
            next = (rate - 1.0) / 2.0;
        }

        if !next.is_finite() || next.abs() > MAX_RATE {
            return Err(NoConvergence::Diverged { iteration, rate: next });
        }

        if !damped && (next - rate).abs() < options.step_tolerance {
            let (npv, _) = npv_and_derivative(&series, next);
            return Ok(IrrResult {
                rate: next,
                iterations: iteration + 1,
                npv,
            });
        }

        rate = next;
    }

    Err(NoConvergence::IterationLimit(options.max_iterations))
}

/// Solve with default options and an optional starting guess.
pub fn xirr(cashflows: &[Cashflow], guess: Option<f64>) -> Result<IrrResult, NoConvergence> {
    let options = SolverOptions::default().with_guess(guess.unwrap_or(DEFAULT_GUESS));
    solve(cashflows, &options)
}

/// Try `options.guess` first, then each of `fallback_guesses` in order.
///
/// Returns the first success, or the last failure. Input checks that do not
/// depend on the guess (too few flows, no sign change) fail immediately.
pub fn solve_with_fallback(
    cashflows: &[Cashflow],
    options: &SolverOptions,
    fallback_guesses: &[f64],
) -> Result<IrrResult, NoConvergence> {
    let mut last_err = match solve(cashflows, options) {
        Ok(result) => return Ok(result),
        Err(
            err @ (NoConvergence::TooFewCashflows(_)
            | NoConvergence::NoSignChange
            | NoConvergence::NonFiniteCashflow
            | NoConvergence::DeadlineExceeded(_)),
        ) => return Err(err),
        Err(err) => err,
    };

    for &guess in fallback_guesses {
        log::debug!("XIRR retry with guess {} after: {}", guess, last_err);
        match solve(cashflows, &options.with_guess(guess)) {
            Ok(result) => return Ok(result),
            Err(err @ NoConvergence::DeadlineExceeded(_)) => return Err(err),
            Err(err) => last_err = err,
        }
    }

    Err(last_err)
}
