//! Persisting the run's artifacts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use nsch_model::{AuditReport, HarmonizeError};

use crate::reconcile::FactorSchema;

fn create(path: &Path) -> Result<BufWriter<File>, HarmonizeError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes the canonical table as CSV with a header row.
pub fn write_canonical_csv(frame: &mut DataFrame, path: &Path) -> Result<(), HarmonizeError> {
    let mut file = create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)
        .map_err(HarmonizeError::data_frame)?;
    file.flush()?;
    info!(path = %path.display(), rows = frame.height(), "wrote canonical table");
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), HarmonizeError> {
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, value)
        .map_err(|e| HarmonizeError::Io(std::io::Error::other(e)))?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

/// Writes the factor schema as a JSON codebook.
pub fn write_codebook(schema: &FactorSchema, path: &Path) -> Result<(), HarmonizeError> {
    write_json(schema, path)?;
    info!(path = %path.display(), variables = schema.variables.len(), "wrote codebook");
    Ok(())
}

/// Writes accumulated warnings as JSON.
pub fn write_audit_report(report: &AuditReport, path: &Path) -> Result<(), HarmonizeError> {
    write_json(report, path)?;
    info!(path = %path.display(), warnings = report.len(), "wrote audit report");
    Ok(())
}
