//! Cashflow builder
//!
//! Turns trade records from one or more sources into a signed cashflow series
//! and appends the current portfolio value as the terminal inflow:
//!
//! ```text
//! Amount    = Quantity × Price
//! Cash Flow = -Amount   (buy)
//!           = +Amount   (sell)
//! ```
//!
//! Records keep their source order, then their row order within the source.
//! Every cell is validated; the first bad row fails the whole build.

use crate::error::DataValidationError;
use crate::models::{Cashflow, TradeRecord, TradeSource, TradeType};
use chrono::{Local, NaiveDate, NaiveDateTime};

/// Parse date string flexibly - ISO dates first, then the usual broker formats
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(s, "%d.%m.%Y").ok())
        // slash dates are month-first, day-first only when the month would be > 12
        .or_else(|| NaiveDate::parse_from_str(s, "%m/%d/%Y").ok())
        .or_else(|| NaiveDate::parse_from_str(s, "%d/%m/%Y").ok())
}

/// Parse a number in plain, US (1,234.56) or German (1.234,56) notation.
///
/// Returns `None` for anything that does not end up a finite number.
pub(crate) fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned = s
        .replace(' ', "")
        .replace('€', "")
        .replace('$', "")
        .replace("EUR", "")
        .replace("USD", "");

    let value: f64 = if cleaned.contains('.') && cleaned.contains(',') {
        if cleaned.rfind(',') > cleaned.rfind('.') {
            cleaned.replace('.', "").replace(',', ".").parse().ok()?
        } else {
            cleaned.replace(',', "").parse().ok()?
        }
    } else if let Some(pos) = cleaned.rfind(',') {
        // 1,5 is a German decimal, 1,000 is US thousands
        if cleaned.len() - pos <= 3 {
            cleaned.replace(',', ".").parse().ok()?
        } else {
            cleaned.replace(',', "").parse().ok()?
        }
    } else {
        cleaned.parse().ok()?
    };

    value.is_finite().then_some(value)
}

fn required<'a>(
    source: &TradeSource,
    record: &'a TradeRecord,
    cell: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, DataValidationError> {
    cell.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DataValidationError::MissingField {
            source_name: source.name.clone(),
            row: record.row,
            field,
        })
}

fn numeric(
    source: &TradeSource,
    record: &TradeRecord,
    cell: &Option<String>,
    field: &'static str,
) -> Result<f64, DataValidationError> {
    let raw = required(source, record, cell, field)?;
    parse_decimal(raw).ok_or_else(|| DataValidationError::NotNumeric {
        source_name: source.name.clone(),
        row: record.row,
        field,
        value: raw.to_string(),
    })
}

/// Validate one record and derive its signed cash flow.
pub fn trade_cashflow(source: &TradeSource, record: &TradeRecord) -> Result<Cashflow, DataValidationError> {
    let raw_date = required(source, record, &record.trade_date, "Trade Date")?;
    let date = parse_date(raw_date).ok_or_else(|| DataValidationError::InvalidDate {
        source_name: source.name.clone(),
        row: record.row,
        value: raw_date.to_string(),
    })?;

    let quantity = numeric(source, record, &record.quantity, "Quantity")?;
    let price = numeric(source, record, &record.price, "Price")?;

    let raw_type = required(source, record, &record.trade_type, "Trade Type")?;
    let trade_type: TradeType = raw_type
        .parse()
        .map_err(|_| DataValidationError::UnknownTradeType {
            source_name: source.name.clone(),
            row: record.row,
            value: raw_type.to_string(),
        })?;

    let amount = quantity * price;
    Ok(Cashflow::new(date, trade_type.sign() * amount))
}

/// Build the cashflow series for an XIRR calculation.
///
/// The last element is always `(as_of, portfolio_value)`.
pub fn build_cashflows(
    sources: &[TradeSource],
    portfolio_value: f64,
    as_of: NaiveDate,
) -> Result<Vec<Cashflow>, DataValidationError> {
    if !portfolio_value.is_finite() || portfolio_value < 0.0 {
        return Err(DataValidationError::InvalidPortfolioValue(portfolio_value));
    }

    let record_count: usize = sources.iter().map(|s| s.records.len()).sum();
    let mut cashflows = Vec::with_capacity(record_count + 1);

    for source in sources {
        for record in &source.records {
            cashflows.push(trade_cashflow(source, record)?);
        }
        log::debug!("{}: {} trades", source.name, source.records.len());
    }

    cashflows.push(Cashflow::new(as_of, portfolio_value));
    Ok(cashflows)
}

/// [`build_cashflows`] evaluated at today's local date.
pub fn build_cashflows_today(sources: &[TradeSource], portfolio_value: f64) -> Result<Vec<Cashflow>, DataValidationError> {
    build_cashflows(sources, portfolio_value, Local::now().date_naive())
}
