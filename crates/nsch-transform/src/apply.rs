//! Label application.
//!
//! Turns a year's all-numeric extract into typed columns using that year's
//! [`LabelSet`]: categorical variables become [`CategoricalColumn`]s that keep
//! the raw code next to its description, pass-through variables stay numeric
//! with sentinels nulled. Columns that are already categorical are left alone,
//! so applying twice changes nothing.

use std::collections::BTreeMap;

use tracing::{debug, info_span, warn};

use nsch_common::format_numeric;
use nsch_model::{
    AuditWarning, CategoricalColumn, Column, LabelSet, LookupResult, Sentinel, ValueLabels,
    VariableClass, YearTable,
};

use crate::sentinel::{null_numeric_sentinels, sentinel_level};

/// Counts from labeling one year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplySummary {
    pub categorical: usize,
    pub pass_through: usize,
    /// Columns that were already labeled.
    pub skipped: usize,
    pub warnings: Vec<AuditWarning>,
}

/// Resolves one raw value against a variable's declarations.
///
/// Sentinel codes resolve to their canonical description whether or not the
/// year declared them.
pub fn lookup_code(labels: &ValueLabels, value: f64) -> LookupResult<(i64, String)> {
    if value.fract() != 0.0 {
        return LookupResult::Unmapped;
    }
    let code = value as i64;
    if let Some(sentinel) = Sentinel::from_code(code) {
        return LookupResult::Found(sentinel_level(sentinel));
    }
    match labels.description_for(code) {
        Some(description) => LookupResult::Found((code, description.to_string())),
        None => LookupResult::Unmapped,
    }
}

/// Labels one raw column. Unmapped values become null and are reported once
/// per distinct value.
pub fn label_column(
    year: u16,
    values: &[Option<f64>],
    labels: &ValueLabels,
) -> (CategoricalColumn, Vec<AuditWarning>) {
    let mut codes = Vec::with_capacity(values.len());
    let mut descriptions = Vec::with_capacity(values.len());
    let mut unmapped: BTreeMap<String, u64> = BTreeMap::new();

    for value in values {
        let resolved = match value {
            None => None,
            Some(v) => match lookup_code(labels, *v) {
                LookupResult::Found(level) => Some(level),
                LookupResult::Unmapped | LookupResult::NotApplicable => {
                    *unmapped.entry(format_numeric(*v)).or_default() += 1;
                    None
                }
            },
        };
        match resolved {
            Some((code, description)) => {
                codes.push(Some(code));
                descriptions.push(Some(description));
            }
            None => {
                codes.push(None);
                descriptions.push(None);
            }
        }
    }

    let warnings = unmapped
        .into_iter()
        .map(|(value, count)| {
            warn!(year, variable = %labels.variable, value = %value, count, "unmapped code set to null");
            AuditWarning::unmapped_code(year, &labels.variable, &value, count)
        })
        .collect();
    (
        CategoricalColumn {
            codes,
            labels: descriptions,
        },
        warnings,
    )
}

/// Labels every column of `table` in place.
pub fn apply_labels(table: &mut YearTable, labels: &LabelSet) -> ApplySummary {
    let year = table.year;
    let _span = info_span!("label", year).entered();
    let mut summary = ApplySummary::default();

    let names: Vec<String> = table.names().map(str::to_string).collect();
    for name in names {
        let Some(column) = table.get_mut(&name) else {
            continue;
        };
        let Column::Numeric(values) = column else {
            summary.skipped += 1;
            continue;
        };
        match (labels.classify(&name), labels.value_labels(&name)) {
            (VariableClass::Categorical, Some(value_labels)) => {
                let (labeled, warnings) = label_column(year, values, value_labels);
                *column = Column::Categorical(labeled);
                summary.categorical += 1;
                summary.warnings.extend(warnings);
            }
            _ => {
                let nulled = null_numeric_sentinels(values);
                if nulled > 0 {
                    debug!(year, variable = %name, nulled, "sentinels nulled in numeric column");
                }
                summary.pass_through += 1;
            }
        }
    }

    debug!(
        year,
        categorical = summary.categorical,
        pass_through = summary.pass_through,
        skipped = summary.skipped,
        unmapped = summary.warnings.len(),
        "applied labels"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsch_model::LabelCode;

    fn sex_labels() -> ValueLabels {
        let mut labels = ValueLabels::new("sc_sex");
        labels.insert(LabelCode::Value(1), "Male").unwrap();
        labels.insert(LabelCode::Value(2), "Female").unwrap();
        labels
    }

    #[test]
    fn lookup_branches() {
        let labels = sex_labels();
        assert_eq!(
            lookup_code(&labels, 2.0),
            LookupResult::Found((2, "Female".to_string()))
        );
        assert_eq!(
            lookup_code(&labels, 998.0),
            LookupResult::Found((998, "Logical skip".to_string()))
        );
        assert_eq!(lookup_code(&labels, 7.0), LookupResult::Unmapped);
        assert_eq!(lookup_code(&labels, 1.5), LookupResult::Unmapped);
    }

    #[test]
    fn unmapped_values_are_counted_once_per_value() {
        let labels = sex_labels();
        let values = [Some(1.0), Some(7.0), Some(7.0), None, Some(3.0)];
        let (column, warnings) = label_column(2017, &values, &labels);
        assert_eq!(column.codes, vec![Some(1), None, None, None, None]);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[1].value.as_deref(), Some("7"));
        assert_eq!(warnings[1].count, 2);
    }
}
