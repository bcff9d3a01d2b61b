//! Harmonization run with explicit stages.
//!
//! 1. **Ingest**: discover each year's files, read the side table
//! 2. **Load**: parse labels and read the extract, one rayon task per year
//! 3. **Harmonize**: label, transform and reconcile each year, then the
//!    factor schema, stacked table and side-table join
//! 4. **Output**: canonical CSV, codebook and audit report

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use tracing::{info, info_span};

use nsch_ingest::{
    RawYearTable, YearFiles, discover_year_files, read_label_definitions, read_side_table,
    read_year_table,
};
use nsch_model::TransformationSpec;
use nsch_transform::{
    HarmonizeOutput, YearInput, harmonize, write_audit_report, write_canonical_csv,
    write_codebook,
};

/// Parses a year selection such as `2016-2022` or `2016,2018,2020-2021`.
///
/// The result is sorted and free of duplicates.
pub fn parse_years(text: &str) -> Result<Vec<u16>> {
    let mut years = BTreeSet::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u16 = start
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid year range `{part}`"))?;
                let end: u16 = end
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid year range `{part}`"))?;
                if start > end {
                    bail!("year range `{part}` runs backwards");
                }
                years.extend(start..=end);
            }
            None => {
                let year: u16 = part
                    .parse()
                    .with_context(|| format!("invalid year `{part}`"))?;
                years.insert(year);
            }
        }
    }
    if years.is_empty() {
        bail!("no survey years selected");
    }
    Ok(years.into_iter().collect())
}

/// Reads one year's label script and extract.
pub fn load_year(files: &YearFiles) -> Result<YearInput> {
    let labels = read_label_definitions(&files.labels, files.year)
        .with_context(|| format!("read labels for {}", files.year))?;
    let RawYearTable { table, warnings } = read_year_table(&files.data, files.year)
        .with_context(|| format!("read extract for {}", files.year))?;
    let mut input = YearInput::new(labels, table);
    input.warnings = warnings;
    Ok(input)
}

/// Loads every year in parallel; the first failure wins.
pub fn load_years(files: &[YearFiles]) -> Result<Vec<YearInput>> {
    files
        .par_iter()
        .map(|files| info_span!("ingest", year = files.year).in_scope(|| load_year(files)))
        .collect()
}

/// Runs every stage up to the assembled table.
pub fn run_pipeline(
    data_dir: &Path,
    years: &[u16],
    spec: &TransformationSpec,
    side_table: Option<&Path>,
) -> Result<HarmonizeOutput> {
    let start = Instant::now();
    let discovered = discover_year_files(data_dir, years)
        .with_context(|| format!("discover yearly files in {}", data_dir.display()))?;
    let side = side_table
        .map(|path| {
            read_side_table(path, &spec.household_key)
                .with_context(|| format!("read side table {}", path.display()))
        })
        .transpose()?;

    let inputs = load_years(&discovered)?;
    let output = harmonize(inputs, spec, side.as_ref()).context("harmonize survey years")?;
    info!(
        years = discovered.len(),
        rows = output.table.height(),
        warnings = output.audit.len(),
        duration_ms = start.elapsed().as_millis(),
        "pipeline complete"
    );
    Ok(output)
}

/// Where a run's artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub codebook: PathBuf,
    pub audit_report: PathBuf,
}

impl OutputPaths {
    /// Places the codebook and audit report beside the table unless given.
    pub fn beside(table: &Path, codebook: Option<PathBuf>, audit_report: Option<PathBuf>) -> Self {
        Self {
            table: table.to_path_buf(),
            codebook: codebook.unwrap_or_else(|| table.with_extension("codebook.json")),
            audit_report: audit_report.unwrap_or_else(|| table.with_extension("audit.json")),
        }
    }
}

/// Writes the canonical table, the codebook and the audit report.
pub fn write_outputs(output: &mut HarmonizeOutput, paths: &OutputPaths) -> Result<()> {
    let _span = info_span!("output").entered();
    write_canonical_csv(&mut output.table.frame, &paths.table)
        .with_context(|| format!("write {}", paths.table.display()))?;
    write_codebook(&output.table.schema, &paths.codebook)
        .with_context(|| format!("write {}", paths.codebook.display()))?;
    write_audit_report(&output.audit, &paths.audit_report)
        .with_context(|| format!("write {}", paths.audit_report.display()))?;
    Ok(())
}
