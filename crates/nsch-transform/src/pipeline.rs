//! End-to-end harmonization over in-memory inputs.
//!
//! Each year runs label application, transformation and per-year
//! reconciliation on its own rayon task. The first failing year aborts the
//! run; the schema and the assembled table are only built once every year has
//! finished.

use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, info_span};

use nsch_model::{
    AuditReport, AuditWarning, Column, HarmonizeError, LabelSet, TransformationSpec, YearTable,
};

use crate::apply::apply_labels;
use crate::assemble::{CanonicalTable, assemble};
use crate::engine::transform_year;
use crate::reconcile::{ReconciledYear, reconcile_schema, reconcile_year};

/// One year's parsed inputs.
#[derive(Debug, Clone)]
pub struct YearInput {
    pub labels: LabelSet,
    pub table: YearTable,
    /// Warnings raised while loading, carried into the report.
    pub warnings: Vec<AuditWarning>,
}

impl YearInput {
    pub fn new(labels: LabelSet, table: YearTable) -> Self {
        Self {
            labels,
            table,
            warnings: Vec::new(),
        }
    }

    pub fn year(&self) -> u16 {
        self.table.year
    }
}

/// Per-year figures for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    pub year: u16,
    pub rows: usize,
    pub columns: usize,
    pub categorical: usize,
    pub numeric: usize,
    pub absent: usize,
    pub warnings: usize,
}

impl YearSummary {
    fn of(year: &ReconciledYear) -> Self {
        let categorical = year
            .table
            .columns()
            .filter(|(name, column)| {
                !year.absent.contains(*name) && matches!(column, Column::Categorical(_))
            })
            .count();
        let present = year.table.width() - year.absent.len();
        Self {
            year: year.year,
            rows: year.height(),
            columns: year.table.width(),
            categorical,
            numeric: present - categorical,
            absent: year.absent.len(),
            warnings: year.warnings.len(),
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct HarmonizeOutput {
    pub table: CanonicalTable,
    pub audit: AuditReport,
    pub years: Vec<YearSummary>,
}

/// Labels, transforms and reconciles one year.
pub fn process_year(input: YearInput, spec: &TransformationSpec) -> ReconciledYear {
    let YearInput {
        labels,
        mut table,
        warnings: mut load_warnings,
    } = input;
    let year = table.year;
    let _span = info_span!("year", year).entered();

    let applied = apply_labels(&mut table, &labels);
    load_warnings.extend(applied.warnings);
    load_warnings.extend(transform_year(&mut table, spec));

    let mut reconciled = reconcile_year(table, &labels, spec);
    load_warnings.append(&mut reconciled.warnings);
    reconciled.warnings = load_warnings;
    info!(
        year,
        rows = reconciled.height(),
        warnings = reconciled.warnings.len(),
        "year processed"
    );
    reconciled
}

/// Builds the schema and the canonical table from finished years.
pub fn finish(
    mut years: Vec<ReconciledYear>,
    spec: &TransformationSpec,
    side: Option<&DataFrame>,
) -> Result<HarmonizeOutput, HarmonizeError> {
    let (schema, schema_warnings) = reconcile_schema(&mut years, spec)?;

    let mut audit = AuditReport::new();
    for year in &years {
        audit.extend(year.warnings.iter().cloned());
    }
    audit.extend(schema_warnings);

    let summaries = years.iter().map(YearSummary::of).collect();
    let (table, join_warnings) = assemble(&years, schema, side, spec)?;
    audit.extend(join_warnings);
    audit.sort();

    info!(
        rows = table.height(),
        variables = table.schema.variables.len(),
        factors = table.schema.factor_count(),
        warnings = audit.len(),
        "harmonization complete"
    );
    Ok(HarmonizeOutput {
        table,
        audit,
        years: summaries,
    })
}

/// Processes every year in parallel, then assembles.
pub fn harmonize(
    inputs: Vec<YearInput>,
    spec: &TransformationSpec,
    side: Option<&DataFrame>,
) -> Result<HarmonizeOutput, HarmonizeError> {
    let mut seen = std::collections::BTreeSet::new();
    for input in &inputs {
        if !seen.insert(input.year()) {
            return Err(HarmonizeError::config(format!(
                "survey year {} supplied twice",
                input.year()
            )));
        }
    }
    let years: Vec<ReconciledYear> = inputs
        .into_par_iter()
        .map(|input| process_year(input, spec))
        .collect();
    finish(years, spec, side)
}
