//! Raw yearly extracts.
//!
//! Every column of a yearly extract is read as text and coerced to a number.
//! Stata extended-missing tokens become their sentinel codes, the `stratum`
//! column's `2A` stratum folds into `2`, and anything else that is not a
//! number becomes null and is counted.

use std::collections::BTreeSet;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info_span, warn};

use nsch_common::parse_f64;
use nsch_model::{AuditWarning, Column, Sentinel, WarningKind, YearTable};

use crate::error::{IngestError, Result};

/// Column whose `2A`/`2a` values fold into stratum `2`.
pub const STRATUM_COLUMN: &str = "stratum";

/// Cells treated as ordinary blanks rather than coercion failures.
const BLANK_MARKERS: &[&str] = &["", ".", "nan", "na"];

/// A yearly extract with every column numeric, plus coercion warnings.
#[derive(Debug, Clone)]
pub struct RawYearTable {
    pub table: YearTable,
    pub warnings: Vec<AuditWarning>,
}

/// Reads one year's CSV extract.
pub fn read_year_table(path: &Path, year: u16) -> Result<RawYearTable> {
    let _span = info_span!("ingest", year, path = %path.display()).entered();
    // Schema inference is off so tokens like `.m` survive as text.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    year_table_from_frame(&df, year, path)
}

/// Converts an already-loaded frame. `source` is only used in errors.
pub fn year_table_from_frame(df: &DataFrame, year: u16, source: &Path) -> Result<RawYearTable> {
    let mut table = YearTable::new(year, df.height());
    let mut warnings = Vec::new();
    let mut seen = BTreeSet::new();

    for column in df.get_columns() {
        let name = column.name().trim().trim_matches('\u{feff}').to_lowercase();
        if !seen.insert(name.clone()) {
            return Err(IngestError::DuplicateColumn {
                column: name,
                path: source.to_path_buf(),
            });
        }

        let text = column.cast(&DataType::String)?;
        let chunked = text.str()?;
        let is_stratum = name == STRATUM_COLUMN;
        let mut coerced = 0u64;
        let mut example: Option<String> = None;
        let values: Vec<Option<f64>> = chunked
            .iter()
            .map(|cell| {
                let Some(cell) = cell else {
                    return None;
                };
                match coerce_cell(cell, is_stratum) {
                    Coerced::Number(v) => Some(v),
                    Coerced::Blank => None,
                    Coerced::Invalid => {
                        coerced += 1;
                        example.get_or_insert_with(|| cell.trim().to_string());
                        None
                    }
                }
            })
            .collect();

        if coerced > 0 {
            let sample = example.unwrap_or_default();
            warn!(year, column = %name, count = coerced, sample = %sample, "non-numeric cells set to null");
            warnings.push(
                AuditWarning::new(
                    WarningKind::CoercedValue,
                    format!("{coerced} non-numeric cell(s) set to null"),
                )
                .with_year(year)
                .with_variable(name.clone())
                .with_value(sample)
                .with_count(coerced),
            );
        }
        table.insert(name, Column::Numeric(values)).map_err(|e| {
            IngestError::DataFrame {
                message: e.to_string(),
            }
        })?;
    }

    debug!(year, rows = table.height(), columns = table.width(), "loaded raw table");
    Ok(RawYearTable { table, warnings })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Coerced {
    Number(f64),
    Blank,
    Invalid,
}

fn coerce_cell(cell: &str, is_stratum: bool) -> Coerced {
    let trimmed = cell.trim();
    if BLANK_MARKERS
        .iter()
        .any(|marker| marker.eq_ignore_ascii_case(trimmed))
    {
        return Coerced::Blank;
    }
    if let Some(sentinel) = Sentinel::from_token(trimmed) {
        return Coerced::Number(sentinel.code() as f64);
    }
    if is_stratum && trimmed.eq_ignore_ascii_case("2a") {
        return Coerced::Number(2.0);
    }
    match parse_f64(trimmed) {
        Some(v) => Coerced::Number(v),
        None => Coerced::Invalid,
    }
}
