//! The derived-variable side table joined in at the end.

use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Reads the side table, lowercasing headers, and checks the key column exists.
pub fn read_side_table(path: &Path, key: &str) -> Result<DataFrame> {
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
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

    let columns: Vec<Column> = raw
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().trim().trim_matches('\u{feff}').to_lowercase();
            column.clone().with_name(name.into())
        })
        .collect();
    let df = DataFrame::new(columns)?;

    if df.column(key).is_err() {
        return Err(IngestError::MissingColumn {
            column: key.to_string(),
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), rows = df.height(), columns = df.width(), "loaded side table");
    Ok(df)
}
