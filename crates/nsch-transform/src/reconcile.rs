//! Column reconciliation.
//!
//! Runs in two phases. [`reconcile_year`] works on one year alone: it cuts
//! the table down to `desired_variables`, applies the configured level
//! collapses and nulls sentinel levels. [`reconcile_schema`] runs once all
//! years are done and builds the shared [`FactorSchema`] from descriptions,
//! never raw codes, rejecting disagreements it cannot absorb.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};

use nsch_model::{
    AuditWarning, CategoricalColumn, Column, LabelSet, SchemaMismatchError, TransformationSpec,
    VariableClass, WarningKind, YearTable,
};

use crate::sentinel::{collapse_sentinel_levels, null_numeric_sentinels};

/// One year's table after per-year reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledYear {
    pub year: u16,
    /// Exactly the desired variables.
    pub table: YearTable,
    /// Desired variables this year did not provide; their columns are null.
    pub absent: BTreeSet<String>,
    /// State codes read before the table was subset.
    pub state_codes: Vec<Option<f64>>,
    /// Short variable descriptions declared this year.
    pub descriptions: BTreeMap<String, String>,
    pub warnings: Vec<AuditWarning>,
}

impl ReconciledYear {
    pub fn height(&self) -> usize {
        self.table.height()
    }
}

/// Creates a key keeping only uppercase alphanumerics; levels that share a
/// key differ only in case, spacing or punctuation.
fn compact_key(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

fn state_codes(table: &YearTable, column: &str) -> Option<Vec<Option<f64>>> {
    match table.get(column)? {
        Column::Numeric(values) => Some(values.clone()),
        Column::Categorical(c) => Some(c.codes.iter().map(|c| c.map(|c| c as f64)).collect()),
    }
}

/// Rewrites collapsed levels. The broader level keeps its own code when the
/// column already carries it.
fn collapse_levels(column: &mut CategoricalColumn, collapses: &BTreeMap<String, String>) -> usize {
    let mut target_codes: BTreeMap<&str, i64> = BTreeMap::new();
    for (code, label) in column.codes.iter().zip(&column.labels) {
        if let (Some(code), Some(label)) = (code, label)
            && collapses.values().any(|into| into == label)
        {
            target_codes.entry(label.as_str()).or_insert(*code);
        }
    }
    let target_codes: BTreeMap<String, i64> = target_codes
        .into_iter()
        .map(|(label, code)| (label.to_string(), code))
        .collect();

    let mut changed = 0;
    for (code, label) in column.codes.iter_mut().zip(column.labels.iter_mut()) {
        let Some(into) = label.as_deref().and_then(|l| collapses.get(l)) else {
            continue;
        };
        if let Some(target) = target_codes.get(into) {
            *code = Some(*target);
        }
        *label = Some(into.clone());
        changed += 1;
    }
    changed
}

/// Subsets and cleans one year.
pub fn reconcile_year(
    mut table: YearTable,
    labels: &LabelSet,
    spec: &TransformationSpec,
) -> ReconciledYear {
    let year = table.year;
    let _span = info_span!("reconcile", year).entered();
    let mut warnings = Vec::new();

    let state_codes = state_codes(&table, &spec.state_code_column).unwrap_or_else(|| {
        warn!(year, column = %spec.state_code_column, "state code column absent");
        warnings.push(
            AuditWarning::new(WarningKind::MissingVariable, "state code column absent; state is null")
                .with_year(year)
                .with_variable(spec.state_code_column.clone())
                .with_count(table.height() as u64),
        );
        vec![None; table.height()]
    });

    let before = table.width();
    table.retain(|name, _| spec.is_desired(name));
    debug!(year, dropped = before - table.width(), "subset to desired variables");

    let mut absent = BTreeSet::new();
    for name in &spec.desired_variables {
        if table.contains(name) {
            continue;
        }
        debug!(year, variable = %name, "desired variable absent; filled with nulls");
        warnings.push(
            AuditWarning::new(WarningKind::MissingVariable, "variable absent this year; filled with nulls")
                .with_year(year)
                .with_variable(name.clone())
                .with_count(table.height() as u64),
        );
        let filled = table.insert(name.clone(), Column::Numeric(vec![None; table.height()]));
        debug_assert!(filled.is_ok(), "null fill is built at table height");
        absent.insert(name.clone());
    }

    let names: Vec<String> = table.names().map(str::to_string).collect();
    for name in names {
        if absent.contains(&name) {
            continue;
        }
        let Some(column) = table.get_mut(&name) else {
            continue;
        };
        match column {
            Column::Categorical(categorical) => {
                if let Some(collapses) = spec.level_collapses.get(&name) {
                    let changed = collapse_levels(categorical, collapses);
                    debug!(year, variable = %name, changed, "collapsed levels");
                }
                let collapsed = collapse_sentinel_levels(categorical);
                if collapsed > 0 {
                    debug!(year, variable = %name, collapsed, "sentinel levels nulled");
                }
            }
            Column::Numeric(values) => {
                null_numeric_sentinels(values);
                if labels.classify(&name) == VariableClass::Categorical {
                    warn!(year, variable = %name, "categorical variable has no descriptions; kept numeric");
                    warnings.push(
                        AuditWarning::new(
                            WarningKind::MissingDescriptions,
                            "declared categorical but arrived without descriptions; kept numeric",
                        )
                        .with_year(year)
                        .with_variable(name.clone()),
                    );
                }
            }
        }
    }

    let descriptions = spec
        .desired_variables
        .iter()
        .filter_map(|name| {
            labels
                .variable_description(name)
                .map(|text| (name.clone(), text.to_string()))
        })
        .collect();

    ReconciledYear {
        year,
        table,
        absent,
        state_codes,
        descriptions,
        warnings,
    }
}

/// How a canonical variable is represented in the assembled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableKind {
    /// Ordered, closed set of non-missing levels.
    Factor { levels: Vec<String> },
    Numeric,
}

/// One canonical variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: VariableKind,
    /// Years that provided the variable.
    pub years: Vec<u16>,
}

/// Cross-year schema of the canonical table, in `desired_variables` order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorSchema {
    pub variables: Vec<SchemaEntry>,
}

impl FactorSchema {
    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.variables.iter().find(|entry| entry.name == name)
    }

    pub fn levels(&self, name: &str) -> Option<&[String]> {
        match &self.get(name)?.kind {
            VariableKind::Factor { levels } => Some(levels),
            VariableKind::Numeric => None,
        }
    }

    pub fn factor_count(&self) -> usize {
        self.variables
            .iter()
            .filter(|entry| matches!(entry.kind, VariableKind::Factor { .. }))
            .count()
    }
}

/// Orders levels by the code each carries in the latest year it appears,
/// then by description.
fn ordered_levels(observed: &[(u16, Vec<(i64, String)>)]) -> Vec<String> {
    let mut latest: BTreeMap<&str, (u16, i64)> = BTreeMap::new();
    for (year, levels) in observed {
        for (code, label) in levels {
            latest
                .entry(label.as_str())
                .and_modify(|(seen_year, seen_code)| {
                    if *year > *seen_year || (*year == *seen_year && *code < *seen_code) {
                        *seen_year = *year;
                        *seen_code = *code;
                    }
                })
                .or_insert((*year, *code));
        }
    }
    let mut levels: Vec<(i64, &str)> = latest
        .into_iter()
        .map(|(label, (_, code))| (code, label))
        .collect();
    levels.sort();
    levels.into_iter().map(|(_, label)| label.to_string()).collect()
}

fn check_near_duplicates(variable: &str, labels: &BTreeSet<&str>) -> Result<(), SchemaMismatchError> {
    let mut keys: BTreeMap<String, &str> = BTreeMap::new();
    for &label in labels {
        if let Some(first) = keys.insert(compact_key(label), label) {
            return Err(SchemaMismatchError::NearDuplicateLevels {
                variable: variable.to_string(),
                first: first.to_string(),
                second: label.to_string(),
            });
        }
    }
    Ok(())
}

fn check_disjoint(
    variable: &str,
    observed: &[(u16, Vec<(i64, String)>)],
) -> Result<(), SchemaMismatchError> {
    let sets: Vec<(u16, BTreeSet<&str>)> = observed
        .iter()
        .map(|(year, levels)| {
            let set = levels.iter().map(|(_, l)| l.as_str()).collect::<BTreeSet<&str>>();
            (*year, set)
        })
        .filter(|(_, set)| !set.is_empty())
        .collect();
    if sets.len() < 2 {
        return Ok(());
    }
    for (idx, (year, set)) in sets.iter().enumerate() {
        let shared = sets
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != idx)
            .any(|(_, (_, other))| !set.is_disjoint(other));
        if !shared {
            return Err(SchemaMismatchError::DisjointVocabulary {
                variable: variable.to_string(),
                year: *year,
                levels: set.iter().map(|l| (*l).to_string()).collect(),
            });
        }
    }
    Ok(())
}

/// Decodes an allow-listed numeric year through the other years' levels, or
/// nulls it when those years disagree on what a code means.
fn decode_fallback(
    variable: &str,
    year: &mut ReconciledYear,
    mapping: Option<&BTreeMap<i64, String>>,
) -> AuditWarning {
    let height = year.table.height();
    let values = year
        .table
        .get(variable)
        .and_then(Column::as_numeric)
        .map(<[Option<f64>]>::to_vec)
        .unwrap_or_else(|| vec![None; height]);

    let (column, message, count) = match mapping {
        Some(mapping) => {
            let mut unmapped = 0u64;
            let mut codes = Vec::with_capacity(height);
            let mut labels = Vec::with_capacity(height);
            for value in &values {
                let code = value.filter(|v| v.fract() == 0.0).map(|v| v as i64);
                match code.and_then(|c| mapping.get(&c).map(|l| (c, l))) {
                    Some((code, label)) => {
                        codes.push(Some(code));
                        labels.push(Some(label.clone()));
                    }
                    None => {
                        if value.is_some() {
                            unmapped += 1;
                        }
                        codes.push(None);
                        labels.push(None);
                    }
                }
            }
            (
                CategoricalColumn { codes, labels },
                format!("decoded through other years' labels; {unmapped} value(s) unmapped"),
                unmapped,
            )
        }
        None => {
            let nonnull = values.iter().filter(|v| v.is_some()).count() as u64;
            (
                CategoricalColumn::nulls(height),
                "other years disagree on code meanings; values set to null".to_string(),
                nonnull,
            )
        }
    };
    warn!(year = year.year, variable, detail = %message, "numeric fallback");
    let decoded = year
        .table
        .insert(variable.to_string(), Column::Categorical(column));
    debug_assert!(decoded.is_ok(), "decoding keeps the column height");
    AuditWarning::new(WarningKind::NumericFallback, message)
        .with_year(year.year)
        .with_variable(variable)
        .with_count(count)
}

/// Builds the shared schema, resolving allow-listed classification drift in
/// place. Any other disagreement is fatal.
pub fn reconcile_schema(
    years: &mut [ReconciledYear],
    spec: &TransformationSpec,
) -> Result<(FactorSchema, Vec<AuditWarning>), SchemaMismatchError> {
    let _span = info_span!("reconcile_schema", years = years.len()).entered();
    years.sort_by_key(|y| y.year);
    let mut warnings = Vec::new();
    let mut schema = FactorSchema::default();

    for name in &spec.desired_variables {
        let mut categorical_years = Vec::new();
        let mut numeric_years = Vec::new();
        for year in years.iter() {
            if year.absent.contains(name) {
                continue;
            }
            match year.table.get(name).map(Column::class) {
                Some(VariableClass::Categorical) => categorical_years.push(year.year),
                Some(VariableClass::PassThrough) => numeric_years.push(year.year),
                None => {}
            }
        }

        if !categorical_years.is_empty() && !numeric_years.is_empty() {
            if numeric_years
                .iter()
                .any(|y| !spec.allows_numeric_fallback(name, *y))
            {
                return Err(SchemaMismatchError::ClassificationDrift {
                    variable: name.clone(),
                    categorical_years,
                    numeric_years,
                });
            }
            let mut mapping: BTreeMap<i64, String> = BTreeMap::new();
            let mut consistent = true;
            for year in years.iter().filter(|y| categorical_years.contains(&y.year)) {
                let Some(column) = year.table.get(name).and_then(Column::as_categorical) else {
                    continue;
                };
                for (code, label) in column.observed_levels() {
                    if let Some(existing) = mapping.insert(code, label.clone())
                        && existing != label
                    {
                        consistent = false;
                    }
                }
            }
            let mapping = consistent.then_some(&mapping);
            for year in years.iter_mut().filter(|y| numeric_years.contains(&y.year)) {
                warnings.push(decode_fallback(name, year, mapping));
            }
            categorical_years.append(&mut numeric_years);
            categorical_years.sort_unstable();
        }

        let description = years
            .iter()
            .rev()
            .find_map(|y| y.descriptions.get(name).cloned());

        let kind = if categorical_years.is_empty() {
            VariableKind::Numeric
        } else {
            let observed: Vec<(u16, Vec<(i64, String)>)> = years
                .iter()
                .filter(|y| categorical_years.contains(&y.year))
                .filter_map(|y| {
                    let column = y.table.get(name).and_then(Column::as_categorical)?;
                    Some((y.year, column.observed_levels()))
                })
                .collect();
            let all: BTreeSet<&str> = observed
                .iter()
                .flat_map(|(_, levels)| levels.iter().map(|(_, l)| l.as_str()))
                .collect();
            check_near_duplicates(name, &all)?;
            check_disjoint(name, &observed)?;
            VariableKind::Factor {
                levels: ordered_levels(&observed),
            }
        };

        let present = if categorical_years.is_empty() {
            numeric_years
        } else {
            categorical_years
        };
        debug!(variable = %name, years = ?present, kind = ?kind, "reconciled variable");
        schema.variables.push(SchemaEntry {
            name: name.clone(),
            description,
            kind,
            years: present,
        });
    }

    Ok((schema, warnings))
}
