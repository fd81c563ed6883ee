pub mod cashflow;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod xirr;

pub use commands::xirr::{calculate_xirr, calculate_xirr_from_files, XirrReport};
pub use config::AppConfig;
pub use error::{DataValidationError, Error, ImportError, NoConvergence, Result};
pub use models::{Cashflow, IrrResult, TradeRecord, TradeSource, TradeType};
