//! Sentinel normalization.
//!
//! Numeric columns lose their sentinels as soon as they are labeled: nothing
//! downstream recodes them. Categorical columns keep each sentinel as a level
//! with its canonical description so recodes can still target it, and only
//! collapse those levels to null during reconciliation.

use nsch_model::{CategoricalColumn, Missingness, Sentinel};

/// Nulls sentinel codes in a numeric column. Returns how many cells changed.
pub fn null_numeric_sentinels(values: &mut [Option<f64>]) -> usize {
    let mut nulled = 0;
    for value in values.iter_mut() {
        if let Missingness::Sentinel(_) = Missingness::classify(*value) {
            *value = None;
            nulled += 1;
        }
    }
    nulled
}

/// The factor level a sentinel carries through the transformation stage.
pub fn sentinel_level(sentinel: Sentinel) -> (i64, String) {
    (sentinel.code(), sentinel.description().to_string())
}

/// True when a factor level stands for missing data.
pub fn is_sentinel_level(label: &str) -> bool {
    Sentinel::is_sentinel_description(label)
}

/// Nulls every row whose level is a sentinel description, code and label
/// together. Returns how many rows changed.
pub fn collapse_sentinel_levels(column: &mut CategoricalColumn) -> usize {
    let mut collapsed = 0;
    for (code, label) in column.codes.iter_mut().zip(column.labels.iter_mut()) {
        if label.as_deref().is_some_and(is_sentinel_level) {
            *code = None;
            *label = None;
            collapsed += 1;
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_sentinels_become_null() {
        let mut values = vec![Some(1.0), Some(996.0), None, Some(999.0), Some(998.5)];
        assert_eq!(null_numeric_sentinels(&mut values), 2);
        assert_eq!(values, vec![Some(1.0), None, None, None, Some(998.5)]);
        assert_eq!(null_numeric_sentinels(&mut values), 0);
    }

    #[test]
    fn sentinel_levels_collapse_by_description() {
        let mut column = CategoricalColumn::new(
            vec![Some(1), Some(997), Some(42)],
            vec![
                Some("Yes".to_string()),
                Some("Not in universe".to_string()),
                Some("logical skip".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(collapse_sentinel_levels(&mut column), 2);
        assert_eq!(column.codes, vec![Some(1), None, None]);
        assert_eq!(column.labels, vec![Some("Yes".to_string()), None, None]);
    }
}
