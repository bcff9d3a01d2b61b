//! Year-scoped transformations: recode, rename, merge.
//!
//! For one year, every applicable `transform` entry runs first, then every
//! rename, then every merge. Transform entries are keyed by the names a year
//! actually uses, renames and merges by the canonical names they produce, so
//! this order is fixed.
//!
//! A recode is a fold over its substitutions. Each step sees the column as
//! the previous step left it, so `[(1 -> 2, "B"), (2 -> 3, "C")]` sends a `1`
//! all the way to `3`/`"C"`.

use tracing::{debug, info_span, warn};

use nsch_model::{
    AuditWarning, CategoricalColumn, Column, LookupResult, MergeEntry, Missingness, Sentinel,
    Substitution, TransformEntry, TransformValue, TransformationSpec, WarningKind, YearTable,
};

/// Rows matched by one substitution.
fn matches_categorical(column: &CategoricalColumn, old: &TransformValue) -> Vec<bool> {
    match old {
        TransformValue::Code(_) => {
            let code = old.as_code();
            column
                .codes
                .iter()
                .map(|c| code.is_some() && *c == code)
                .collect()
        }
        TransformValue::Label(label) => column
            .labels
            .iter()
            .map(|l| l.as_deref() == Some(label.as_str()))
            .collect(),
    }
}

/// Applies one substitution to a categorical column and returns it.
///
/// Matching rows take the new code; then every row holding the new code,
/// matched or not, takes the new label. Without a new label, matching rows
/// take the label already attached to the new code, if any row has one.
pub fn recode_categorical(mut column: CategoricalColumn, step: &Substitution) -> CategoricalColumn {
    let matched = matches_categorical(&column, &step.old);
    let target_label = step
        .new_label
        .clone()
        .or_else(|| step.new_value.as_ref().and_then(TransformValue::as_label).map(str::to_string));

    match step.new_value.as_ref().and_then(TransformValue::as_code) {
        Some(new_code) => {
            let existing = column
                .codes
                .iter()
                .zip(&column.labels)
                .enumerate()
                .find(|(idx, (code, label))| {
                    !matched[*idx] && **code == Some(new_code) && label.is_some()
                })
                .and_then(|(_, (_, label))| label.clone());
            for (idx, hit) in matched.iter().enumerate() {
                if *hit {
                    column.codes[idx] = Some(new_code);
                }
            }
            if let Some(label) = target_label.or(existing) {
                for (code, slot) in column.codes.iter().zip(column.labels.iter_mut()) {
                    if *code == Some(new_code) {
                        *slot = Some(label.clone());
                    }
                }
            }
        }
        None => {
            if let Some(label) = target_label {
                for (idx, hit) in matched.iter().enumerate() {
                    if *hit {
                        column.labels[idx] = Some(label.clone());
                    }
                }
            }
        }
    }
    column
}

/// Applies one substitution to a numeric column. Labels have nothing to
/// attach to here and are ignored.
pub fn recode_numeric(mut values: Vec<Option<f64>>, step: &Substitution) -> Vec<Option<f64>> {
    let (Some(old), Some(new)) = (
        step.old.as_number(),
        step.new_value.as_ref().and_then(TransformValue::as_number),
    ) else {
        return values;
    };
    for value in values.iter_mut() {
        if *value == Some(old) {
            *value = Some(new);
        }
    }
    values
}

/// Runs a transform entry's substitutions, in order, over one column.
pub fn recode_column(column: Column, entry: &TransformEntry) -> Column {
    let steps = entry.substitutions();
    match column {
        Column::Categorical(c) => {
            Column::Categorical(steps.iter().fold(c, recode_categorical))
        }
        Column::Numeric(v) => Column::Numeric(steps.iter().fold(v, recode_numeric)),
    }
}

/// Recodes `variable` in place. Returns the number of substitutions run.
pub fn apply_transform(
    table: &mut YearTable,
    variable: &str,
    entry: &TransformEntry,
) -> LookupResult<usize> {
    let Some(column) = table.remove(variable) else {
        return LookupResult::NotApplicable;
    };
    if matches!(column, Column::Numeric(_)) && entry.new_label.iter().any(|l| !l.is_empty()) {
        debug!(year = table.year, variable, "numeric column: new_label ignored");
    }
    let recoded = recode_column(column, entry);
    let inserted = table.insert(variable, recoded);
    debug_assert!(inserted.is_ok(), "a recode keeps the column height");
    LookupResult::Found(entry.value.len())
}

/// Moves `old` to `new`, codes and labels together.
///
/// Returns the column that previously held `new`, if any.
pub fn rename_column(table: &mut YearTable, old: &str, new: &str) -> LookupResult<Option<Column>> {
    if old == new {
        return if table.contains(old) {
            LookupResult::Found(None)
        } else {
            LookupResult::NotApplicable
        };
    }
    let Some(column) = table.remove(old) else {
        return LookupResult::NotApplicable;
    };
    match table.insert(new, column) {
        Ok(replaced) => LookupResult::Found(replaced),
        Err(_) => LookupResult::Unmapped,
    }
}

/// How much a merge source has to say for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Answer {
    Null,
    Sentinel,
    Value,
}

fn code_answer(code: &Option<i64>) -> Answer {
    match code {
        None => Answer::Null,
        Some(code) if Sentinel::from_code(*code).is_some() => Answer::Sentinel,
        Some(_) => Answer::Value,
    }
}

fn label_answer(label: &Option<String>) -> Answer {
    match label {
        None => Answer::Null,
        Some(label) if Sentinel::is_sentinel_description(label) => Answer::Sentinel,
        Some(_) => Answer::Value,
    }
}

fn value_answer(value: &Option<f64>) -> Answer {
    match Missingness::classify(*value) {
        Missingness::Absent => Answer::Null,
        Missingness::Sentinel(_) => Answer::Sentinel,
        Missingness::Value(_) => Answer::Value,
    }
}

/// Row-wise coalesce: the first column wins unless the second has more to say.
///
/// A real answer beats a sentinel and a sentinel beats null, so a split
/// question answered in one column and skipped in the other keeps the
/// answer. Codes and labels are coalesced independently. Mixing a
/// categorical and a numeric source yields a categorical column whose
/// numeric side carries codes only.
pub fn coalesce(first: Column, second: Column) -> Column {
    fn pick<T>(
        a: Vec<Option<T>>,
        b: Vec<Option<T>>,
        answer: fn(&Option<T>) -> Answer,
    ) -> Vec<Option<T>> {
        a.into_iter()
            .zip(b)
            .map(|(a, b)| if answer(&b) > answer(&a) { b } else { a })
            .collect()
    }
    fn as_categorical(column: Column) -> CategoricalColumn {
        match column {
            Column::Categorical(c) => c,
            Column::Numeric(values) => {
                let codes: Vec<Option<i64>> = values
                    .iter()
                    .map(|v| v.filter(|v| v.fract() == 0.0).map(|v| v as i64))
                    .collect();
                let labels = vec![None; codes.len()];
                CategoricalColumn { codes, labels }
            }
        }
    }

    match (first, second) {
        (Column::Numeric(a), Column::Numeric(b)) => Column::Numeric(pick(a, b, value_answer)),
        (a, b) => {
            let a = as_categorical(a);
            let b = as_categorical(b);
            Column::Categorical(CategoricalColumn {
                codes: pick(a.codes, b.codes, code_answer),
                labels: pick(a.labels, b.labels, label_answer),
            })
        }
    }
}

/// Merges two source columns into `target`, removing the sources.
///
/// Only defined when both sources exist this year.
pub fn merge_columns(table: &mut YearTable, target: &str, entry: &MergeEntry) -> LookupResult<()> {
    if !table.contains(&entry.column_1) || !table.contains(&entry.column_2) {
        return LookupResult::NotApplicable;
    }
    let (Some(first), Some(second)) = (table.remove(&entry.column_1), table.remove(&entry.column_2))
    else {
        return LookupResult::NotApplicable;
    };
    match table.insert(target, coalesce(first, second)) {
        Ok(_) => LookupResult::Found(()),
        Err(_) => LookupResult::Unmapped,
    }
}

fn not_applicable(year: u16, variable: &str, what: &str) -> AuditWarning {
    debug!(year, variable, what, "configuration entry not applicable");
    AuditWarning::new(
        WarningKind::NotApplicable,
        format!("{what} entry for `{variable}` lists {year} but the column is absent"),
    )
    .with_year(year)
    .with_variable(variable)
}

/// Runs every transform, rename and merge for the table's year.
pub fn transform_year(table: &mut YearTable, spec: &TransformationSpec) -> Vec<AuditWarning> {
    let year = table.year;
    let _span = info_span!("transform", year).entered();
    let mut warnings = Vec::new();

    for (variable, entry) in spec.transforms_for(year) {
        match apply_transform(table, variable, entry) {
            LookupResult::Found(steps) => debug!(year, variable, steps, "recoded"),
            LookupResult::Unmapped | LookupResult::NotApplicable => {
                warnings.push(not_applicable(year, variable, "transform"));
            }
        }
    }

    for (old, entry) in spec.renames_for(year) {
        match rename_column(table, old, &entry.new_name) {
            LookupResult::Found(None) => debug!(year, old, new = %entry.new_name, "renamed"),
            LookupResult::Found(Some(_)) => {
                warn!(year, old, new = %entry.new_name, "rename replaced an existing column");
                warnings.push(
                    AuditWarning::new(
                        WarningKind::RenameOverwrite,
                        format!("rename of `{old}` replaced existing `{}`", entry.new_name),
                    )
                    .with_year(year)
                    .with_variable(entry.new_name.clone()),
                );
            }
            LookupResult::Unmapped | LookupResult::NotApplicable => {
                warnings.push(not_applicable(year, old, "rename"));
            }
        }
    }

    for (target, entry) in spec.merges_for(year) {
        match merge_columns(table, target, entry) {
            LookupResult::Found(()) => debug!(
                year,
                target,
                first = %entry.column_1,
                second = %entry.column_2,
                "merged"
            ),
            LookupResult::Unmapped | LookupResult::NotApplicable => {
                warnings.push(not_applicable(year, target, "merge"));
            }
        }
    }

    warnings
}
