use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A dated cash flow. Negative = money paid into the portfolio (purchase),
/// positive = money received (sale, terminal valuation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cashflow {
    pub date: NaiveDate,
    pub amount: f64,
}

impl Cashflow {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    /// Sign applied to `quantity * price`.
    pub fn sign(self) -> f64 {
        match self {
            TradeType::Buy => -1.0,
            TradeType::Sell => 1.0,
        }
    }
}

impl FromStr for TradeType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TradeType::Buy),
            "sell" => Ok(TradeType::Sell),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Buy => write!(f, "buy"),
            TradeType::Sell => write!(f, "sell"),
        }
    }
}

/// One row of a trade export, cells kept as the raw text that was read.
///
/// `None` means the cell was absent or blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// 1-based line number in the source file (or position for in-memory records)
    pub row: usize,
    pub trade_date: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub trade_type: Option<String>,
}

impl TradeRecord {
    /// Build a record from typed values.
    pub fn new(row: usize, trade_date: NaiveDate, quantity: f64, price: f64, trade_type: TradeType) -> Self {
        Self {
            row,
            trade_date: Some(trade_date.format("%Y-%m-%d").to_string()),
            quantity: Some(quantity.to_string()),
            price: Some(price.to_string()),
            trade_type: Some(trade_type.to_string()),
        }
    }
}

/// Trade records from a single uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSource {
    pub name: String,
    pub records: Vec<TradeRecord>,
}

impl TradeSource {
    pub fn new(name: impl Into<String>, records: Vec<TradeRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

/// Successful XIRR result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrResult {
    /// Annualized rate as decimal (0.1 = 10%)
    pub rate: f64,
    /// Newton iterations used
    pub iterations: usize,
    /// NPV at `rate`
    pub npv: f64,
}
