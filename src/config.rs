//! Application configuration
//!
//! Loaded from a JSON file (camelCase keys, every key optional):
//!
//! ```json
//! {
//!   "import": { "skipRows": 14, "allowedExtensions": ["xlsx", "csv"], "delimiter": ";" },
//!   "solver": { "guess": 0.1, "maxIterations": 50, "timeoutMs": 2000 }
//! }
//! ```

use crate::error::ConfigError;
use crate::xirr::{SolverOptions, DEFAULT_GUESS, DEFAULT_MAX_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Preamble rows before the header in broker trade exports
pub const DEFAULT_SKIP_ROWS: usize = 14;

const CONFIG_DIR_NAME: &str = "portfolio-xirr";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub import: ImportConfig,
    pub solver: SolverConfig,
}

/// Layout of uploaded trade files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    /// Rows skipped before the header row
    pub skip_rows: usize,
    /// Lower-case file extensions accepted for upload
    pub allowed_extensions: Vec<String>,
    /// Field delimiter; detected from the header row when unset
    pub delimiter: Option<char>,
    pub columns: ColumnNames,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            skip_rows: DEFAULT_SKIP_ROWS,
            allowed_extensions: vec!["xlsx".to_string(), "csv".to_string()],
            delimiter: None,
            columns: ColumnNames::default(),
        }
    }
}

/// Header names of the columns the cashflow builder needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnNames {
    pub trade_date: String,
    pub quantity: String,
    pub price: String,
    pub trade_type: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            trade_date: "Trade Date".to_string(),
            quantity: "Quantity".to_string(),
            price: "Price".to_string(),
            trade_type: "Trade Type".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    pub guess: f64,
    pub max_iterations: usize,
    pub npv_tolerance: f64,
    pub step_tolerance: f64,
    /// Overall time budget for one solve
    pub timeout_ms: Option<u64>,
    /// Guesses tried in order when the first guess does not converge
    pub fallback_guesses: Vec<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let defaults = SolverOptions::default();
        Self {
            guess: DEFAULT_GUESS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            npv_tolerance: defaults.npv_tolerance,
            step_tolerance: defaults.step_tolerance,
            timeout_ms: None,
            fallback_guesses: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// Solver options for one run; the deadline starts now.
    pub fn options(&self) -> SolverOptions {
        let options = SolverOptions {
            guess: self.guess,
            max_iterations: self.max_iterations,
            npv_tolerance: self.npv_tolerance,
            step_tolerance: self.step_tolerance,
            deadline: None,
        };
        match self.timeout_ms {
            Some(ms) => options.with_timeout(Duration::from_millis(ms)),
            None => options,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Explicit path if given, else the per-user config file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let solver = &self.solver;
        if !solver.guess.is_finite() || solver.guess <= -1.0 {
            return Err(ConfigError::InvalidValue(format!("solver.guess must be > -1, got {}", solver.guess)));
        }
        if solver.max_iterations == 0 {
            return Err(ConfigError::InvalidValue("solver.maxIterations must be at least 1".to_string()));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(solver.npv_tolerance) || !positive(solver.step_tolerance) {
            return Err(ConfigError::InvalidValue("solver tolerances must be positive".to_string()));
        }
        if self.import.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue("import.allowedExtensions must not be empty".to_string()));
        }
        if let Some(delimiter) = self.import.delimiter {
            if !delimiter.is_ascii() {
                return Err(ConfigError::InvalidValue(format!(
                    "import.delimiter must be an ASCII character, got {:?}",
                    delimiter
                )));
            }
        }
        Ok(())
    }
}

/// `<config dir>/portfolio-xirr/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
