//! Assembly of the canonical long table.
//!
//! Reconciled years are stacked in year order into one polars `DataFrame`:
//! `year`, the desired variables in configuration order, `state`, then the
//! side table's columns. Factor columns hold their level description,
//! numeric columns their value.

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::{debug, info_span, warn};

use nsch_common::{FractionalKey, key_text};
use nsch_model::{
    AuditWarning, Column as TableColumn, HarmonizeError, JoinCardinalityError, TransformationSpec,
    WarningKind, state_name,
};

use crate::reconcile::{FactorSchema, ReconciledYear, VariableKind};

pub const YEAR_COLUMN: &str = "year";
pub const STATE_COLUMN: &str = "state";
const ROW_INDEX: &str = "__row";
const JOIN_KEY: &str = "__key";
/// Duplicate keys quoted in a cardinality error.
const MAX_KEY_EXAMPLES: usize = 5;

/// The pipeline's output: the assembled frame and the schema describing it.
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    pub frame: DataFrame,
    pub schema: FactorSchema,
}

impl CanonicalTable {
    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

fn factor_values(year: &ReconciledYear, name: &str) -> Vec<Option<String>> {
    if year.absent.contains(name) {
        return vec![None; year.height()];
    }
    match year.table.get(name) {
        Some(TableColumn::Categorical(column)) => column.labels.clone(),
        _ => vec![None; year.height()],
    }
}

fn numeric_values(year: &ReconciledYear, name: &str) -> Vec<Option<f64>> {
    if year.absent.contains(name) {
        return vec![None; year.height()];
    }
    match year.table.get(name) {
        Some(TableColumn::Numeric(values)) => values.clone(),
        _ => vec![None; year.height()],
    }
}

/// Stacks the reconciled years and derives `year` and `state`.
///
/// Years must already share one schema; a variable a year did not provide is
/// null for that year's rows.
pub fn concat_years(
    years: &[ReconciledYear],
    schema: &FactorSchema,
) -> Result<DataFrame, HarmonizeError> {
    let height: usize = years.iter().map(ReconciledYear::height).sum();
    let mut columns: Vec<Column> = Vec::with_capacity(schema.variables.len() + 2);

    let year_values: Vec<i32> = years
        .iter()
        .flat_map(|y| std::iter::repeat_n(i32::from(y.year), y.height()))
        .collect();
    columns.push(Series::new(YEAR_COLUMN.into(), year_values).into());

    for entry in &schema.variables {
        let series = match &entry.kind {
            VariableKind::Factor { .. } => {
                let mut values: Vec<Option<String>> = Vec::with_capacity(height);
                for year in years {
                    values.extend(factor_values(year, &entry.name));
                }
                Series::new(entry.name.as_str().into(), values)
            }
            VariableKind::Numeric => {
                let mut values: Vec<Option<f64>> = Vec::with_capacity(height);
                for year in years {
                    values.extend(numeric_values(year, &entry.name));
                }
                Series::new(entry.name.as_str().into(), values)
            }
        };
        columns.push(series.into());
    }

    let states: Vec<Option<&str>> = years
        .iter()
        .flat_map(|y| y.state_codes.iter().map(|code| code.and_then(state_name)))
        .collect();
    columns.push(Series::new(STATE_COLUMN.into(), states).into());

    DataFrame::new(columns).map_err(HarmonizeError::data_frame)
}

/// Canonical key text per row of `frame`, as used by the join.
///
/// Integral numbers and numeric text agree (`7`, `7.0`, `"7"`); a fractional
/// numeric key is an error.
pub fn household_keys(
    frame: &DataFrame,
    key: &str,
    table: &'static str,
) -> Result<Vec<Option<String>>, HarmonizeError> {
    let column = frame.column(key).map_err(HarmonizeError::data_frame)?;
    (0..frame.height())
        .map(|idx| {
            let value = column.get(idx).unwrap_or(AnyValue::Null);
            key_text(value).map_err(|FractionalKey(value)| HarmonizeError::InvalidKey {
                key: key.to_string(),
                table,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Fails when any non-null key occurs more than once.
pub fn check_key_uniqueness(keys: &[Option<String>], key: &str) -> Result<(), HarmonizeError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for text in keys.iter().flatten() {
        *counts.entry(text.as_str()).or_default() += 1;
    }
    let duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    if duplicates.is_empty() {
        return Ok(());
    }
    Err(JoinCardinalityError {
        key: key.to_string(),
        duplicate_keys: duplicates.len(),
        examples: duplicates.into_iter().take(MAX_KEY_EXAMPLES).collect(),
    }
    .into())
}

/// Inner-joins the side table on `key`, keeping the canonical row order.
///
/// Both sides are matched on [`household_keys`], the same values the
/// uniqueness check sees. Rows without a match are dropped and reported.
pub fn join_side_table(
    frame: DataFrame,
    side: &DataFrame,
    key: &str,
) -> Result<(DataFrame, Option<AuditWarning>), HarmonizeError> {
    if frame.column(key).is_err() {
        return Err(HarmonizeError::config(format!(
            "household key `{key}` is not among desired_variables"
        )));
    }
    let side_keys = household_keys(side, key, "side table")?;
    check_key_uniqueness(&side_keys, key)?;
    let frame_keys = household_keys(&frame, key, "canonical table")?;

    // Keys are integral by now, so a float key column narrows losslessly.
    let narrow_key = frame
        .column(key)
        .map_err(HarmonizeError::data_frame)?
        .dtype()
        .is_float();
    let mut order: Vec<Expr> = frame
        .get_column_names()
        .iter()
        .map(|name| match name.as_str() {
            name if name == key && narrow_key => col(key).strict_cast(DataType::Int64),
            name => col(name),
        })
        .collect();
    for name in side.get_column_names() {
        if name.as_str() == key {
            continue;
        }
        if frame.column(name.as_str()).is_ok() {
            warn!(column = %name, "side-table column shadows a canonical column; skipped");
            continue;
        }
        order.push(col(name.as_str()));
    }

    let before = frame.height();
    let mut left = frame;
    left
        .with_column(Series::new(JOIN_KEY.into(), frame_keys))
        .map_err(HarmonizeError::data_frame)?;
    let mut right = side.drop(key).map_err(HarmonizeError::data_frame)?;
    right
        .with_column(Series::new(JOIN_KEY.into(), side_keys))
        .map_err(HarmonizeError::data_frame)?;

    let joined = left
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .join(
            right.lazy(),
            [col(JOIN_KEY)],
            [col(JOIN_KEY)],
            JoinArgs::new(JoinType::Inner),
        )
        .sort([ROW_INDEX], SortMultipleOptions::default())
        .select(order)
        .collect()
        .map_err(HarmonizeError::data_frame)?;

    let dropped = before.checked_sub(joined.height()).ok_or_else(|| {
        HarmonizeError::data_frame(format!(
            "join on `{key}` grew {before} rows to {}",
            joined.height()
        ))
    })?;
    let warning = (dropped > 0).then(|| {
        warn!(dropped, key, "rows without a side-table match dropped");
        AuditWarning::new(
            WarningKind::JoinDropped,
            format!("{dropped} row(s) had no `{key}` match in the side table"),
        )
        .with_variable(key)
        .with_count(dropped as u64)
    });
    Ok((joined, warning))
}

/// Stacks the years and, when given, joins the side table.
pub fn assemble(
    years: &[ReconciledYear],
    schema: FactorSchema,
    side: Option<&DataFrame>,
    spec: &TransformationSpec,
) -> Result<(CanonicalTable, Vec<AuditWarning>), HarmonizeError> {
    let _span = info_span!("assemble", years = years.len()).entered();
    let mut frame = concat_years(years, &schema)?;
    let mut warnings = Vec::new();

    if let Some(side) = side {
        let (joined, warning) = join_side_table(frame, side, &spec.household_key)?;
        frame = joined;
        warnings.extend(warning);
    }

    debug!(rows = frame.height(), columns = frame.width(), "assembled canonical table");
    Ok((CanonicalTable { frame, schema }, warnings))
}
