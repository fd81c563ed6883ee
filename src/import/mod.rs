//! Trade file import.
//!
//! Reads broker exports into [`TradeSource`]s. Spreadsheets (`.xlsx`, first
//! worksheet) go through `calamine`, everything else is read as delimited text.
//! The expected layout is a fixed preamble (account header, statement period,
//! ...) followed by a header row containing at least `Trade Date`, `Quantity`,
//! `Price` and `Trade Type`. Cells are passed on as raw text; validation happens
//! in the cashflow builder.

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::models::{TradeRecord, TradeSource};
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// True if the file name has one of the allowed extensions (case-insensitive).
pub fn allowed_file(name: &str, config: &ImportConfig) -> bool {
    match extension(name) {
        Some(ext) => config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

fn is_spreadsheet(name: &str) -> bool {
    extension(name).is_some_and(|ext| SPREADSHEET_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Reduce an uploaded file name to a safe basename.
///
/// Drops directory components, replaces anything outside `[A-Za-z0-9._-]`
/// with `_` and strips leading dots.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn detect_delimiter(line: &str) -> char {
    let semicolons = line.matches(';').count();
    let commas = line.matches(',').count();
    let tabs = line.matches('\t').count();

    if semicolons >= commas && semicolons >= tabs && semicolons > 0 {
        ';'
    } else if tabs > commas {
        '\t'
    } else {
        ','
    }
}

/// Byte offset of the start of line `n` (0-based), if the content has that many lines.
fn line_offset(content: &str, n: usize) -> Option<usize> {
    if n == 0 {
        return Some(0);
    }
    content
        .match_indices('\n')
        .nth(n - 1)
        .map(|(i, _)| i + 1)
        .filter(|&i| i < content.len())
}

fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}

/// Positions of the date, quantity, price and trade type columns.
fn locate_columns(headers: &[String], name: &Path, config: &ImportConfig) -> Result<[usize; 4], ImportError> {
    let columns = &config.columns;
    let wanted = [
        &columns.trade_date,
        &columns.quantity,
        &columns.price,
        &columns.trade_type,
    ];
    match wanted.map(|c| column_index(headers, c)) {
        [Some(date), Some(quantity), Some(price), Some(trade_type)] => Ok([date, quantity, price, trade_type]),
        indices => Err(ImportError::MissingColumns {
            path: name.to_path_buf(),
            columns: wanted
                .iter()
                .zip(indices)
                .filter(|(_, idx)| idx.is_none())
                .map(|(c, _)| c.to_string())
                .collect(),
        }),
    }
}

fn trade_record(row: usize, [date, quantity, price, trade_type]: [usize; 4], cell: impl Fn(usize) -> Option<String>) -> TradeRecord {
    TradeRecord {
        row,
        trade_date: cell(date),
        quantity: cell(quantity),
        price: cell(price),
        trade_type: cell(trade_type),
    }
}

fn text_cell(value: &str) -> Option<String> {
    Some(value.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Spreadsheet cell as the text the cashflow builder parses. Date cells become `YYYY-MM-DD`.
fn spreadsheet_cell(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(dt) => dt.date().format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        }),
        Data::Error(e) => Some(e.to_string()),
    }
}

fn source_name(name: &Path) -> String {
    name.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.display().to_string())
}

/// Parse trade rows from delimited file content. `name` is used for the source name and errors.
pub fn parse_trades(content: &str, name: &Path, config: &ImportConfig) -> Result<TradeSource, ImportError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let missing_header = || ImportError::MissingHeader {
        path: name.to_path_buf(),
        skip_rows: config.skip_rows,
    };
    let start = line_offset(content, config.skip_rows).ok_or_else(missing_header)?;
    let body = &content[start..];
    let header_line = body.lines().next().ok_or_else(missing_header)?;

    let delimiter = config.delimiter.unwrap_or_else(|| detect_delimiter(header_line));
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(ImportError::InvalidDelimiter(delimiter))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(body.as_bytes());

    let csv_error = |source| ImportError::Csv {
        path: name.to_path_buf(),
        source,
    };
    let headers: Vec<String> = reader.headers().map_err(csv_error)?.iter().map(str::to_string).collect();
    let indices = locate_columns(&headers, name, config)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        // reader lines are 1-based and start at the header row
        let row = record
            .position()
            .map(|p| p.line() as usize + config.skip_rows)
            .unwrap_or(0);

        records.push(trade_record(row, indices, |idx| record.get(idx).and_then(text_cell)));
    }

    Ok(TradeSource::new(source_name(name), records))
}

/// Parse trade rows from a worksheet. `skip_rows` counts sheet rows from the top, blank rows included.
pub fn parse_worksheet(range: &Range<Data>, name: &Path, config: &ImportConfig) -> Result<TradeSource, ImportError> {
    let missing_header = || ImportError::MissingHeader {
        path: name.to_path_buf(),
        skip_rows: config.skip_rows,
    };
    // the range begins at the first non-empty row, not at the top of the sheet
    let first_row = range.start().map(|(row, _)| row as usize).ok_or_else(missing_header)?;
    let header_offset = config.skip_rows.checked_sub(first_row).ok_or_else(missing_header)?;

    let mut rows = range.rows().skip(header_offset);
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(missing_header)?
        .iter()
        .map(|c| spreadsheet_cell(c).unwrap_or_default())
        .collect();
    let indices = locate_columns(&headers, name, config)?;

    let mut records = Vec::new();
    for (i, cells) in rows.enumerate() {
        if cells.iter().all(|c| spreadsheet_cell(c).is_none()) {
            continue;
        }
        let row = config.skip_rows + i + 2;
        records.push(trade_record(row, indices, |idx| cells.get(idx).and_then(spreadsheet_cell)));
    }

    Ok(TradeSource::new(source_name(name), records))
}

fn read_workbook(path: &Path, config: &ImportConfig) -> Result<TradeSource, ImportError> {
    let spreadsheet_error = |source| ImportError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(spreadsheet_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::EmptyWorkbook(path.to_path_buf()))?
        .map_err(spreadsheet_error)?;

    parse_worksheet(&range, path, config)
}

fn read_delimited(path: &Path, config: &ImportConfig) -> Result<TradeSource, ImportError> {
    let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);

    parse_trades(&content, path, config)
}

/// Reject an empty file name or an extension outside the allowed set.
pub fn check_upload(path: &Path, config: &ImportConfig) -> Result<(), ImportError> {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.is_empty() {
        return Err(ImportError::NoSelectedFile);
    }
    if !allowed_file(&sanitize_filename(&name), config) {
        return Err(ImportError::NotAllowed {
            path: path.to_path_buf(),
            allowed: config.allowed_extensions.clone(),
        });
    }
    Ok(())
}

/// Read one trade export from disk.
pub fn read_trade_file(path: &Path, config: &ImportConfig) -> Result<TradeSource, ImportError> {
    check_upload(path, config)?;

    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let source = if is_spreadsheet(&name) {
        read_workbook(path, config)?
    } else {
        read_delimited(path, config)?
    };
    log::info!("Imported {} trades from {}", source.records.len(), path.display());
    Ok(source)
}

/// Read several trade exports, keeping their order.
pub fn read_trade_files(paths: &[PathBuf], config: &ImportConfig) -> Result<Vec<TradeSource>, ImportError> {
    if paths.is_empty() {
        return Err(ImportError::NoInput);
    }
    paths.iter().map(|path| read_trade_file(path, config)).collect()
}
