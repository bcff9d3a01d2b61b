//! In-memory yearly tables.
//!
//! A [`YearTable`] maps variable names to a tagged [`Column`]. Categorical
//! columns keep the raw numeric code next to its description so numeric-keyed
//! recodes still work after labels are attached.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::TableError;
use crate::labels::VariableClass;

/// Raw codes paired with their descriptions, row for row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoricalColumn {
    pub codes: Vec<Option<i64>>,
    pub labels: Vec<Option<String>>,
}

impl CategoricalColumn {
    /// Builds a column; both halves must have the same length.
    pub fn new(codes: Vec<Option<i64>>, labels: Vec<Option<String>>) -> Option<Self> {
        if codes.len() != labels.len() {
            return None;
        }
        Some(Self { codes, labels })
    }

    /// A column of `len` null rows.
    pub fn nulls(len: usize) -> Self {
        Self {
            codes: vec![None; len],
            labels: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, row: usize) -> (Option<i64>, Option<&str>) {
        (
            self.codes.get(row).copied().flatten(),
            self.labels.get(row).and_then(|l| l.as_deref()),
        )
    }

    /// Distinct (code, description) pairs present, sorted by code then description.
    pub fn observed_levels(&self) -> Vec<(i64, String)> {
        let mut seen: BTreeSet<(i64, &str)> = BTreeSet::new();
        for (code, label) in self.codes.iter().zip(&self.labels) {
            if let (Some(code), Some(label)) = (code, label) {
                seen.insert((*code, label.as_str()));
            }
        }
        seen.into_iter()
            .map(|(code, label)| (code, label.to_string()))
            .collect()
    }
}

/// One variable's values for one year.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Categorical(CategoricalColumn),
    Numeric(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Categorical(c) => c.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn class(&self) -> VariableClass {
        match self {
            Column::Categorical(_) => VariableClass::Categorical,
            Column::Numeric(_) => VariableClass::PassThrough,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalColumn> {
        match self {
            Column::Categorical(c) => Some(c),
            Column::Numeric(_) => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Categorical(_) => None,
        }
    }
}

/// All variables of one survey year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearTable {
    pub year: u16,
    height: usize,
    columns: BTreeMap<String, Column>,
}

impl YearTable {
    pub fn new(year: u16, height: usize) -> Self {
        Self {
            year,
            height,
            columns: BTreeMap::new(),
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Inserts or replaces a column, returning the previous one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        column: Column,
    ) -> Result<Option<Column>, TableError> {
        let name = name.into();
        if column.len() != self.height {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.height,
                actual: column.len(),
            });
        }
        Ok(self.columns.insert(name, column))
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keeps only the named columns.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Column) -> bool) {
        self.columns.retain(|name, column| keep(name, column));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_checks_height() {
        let mut table = YearTable::new(2018, 2);
        assert!(table.insert("a", Column::Numeric(vec![Some(1.0), None])).is_ok());
        let err = table
            .insert("b", Column::Numeric(vec![Some(1.0)]))
            .unwrap_err();
        assert_eq!(
            err,
            TableError::LengthMismatch {
                column: "b".to_string(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn observed_levels_are_distinct_and_sorted() {
        let column = CategoricalColumn::new(
            vec![Some(2), Some(1), Some(2), None, Some(3)],
            vec![
                Some("High".to_string()),
                Some("Low".to_string()),
                Some("High".to_string()),
                Some("orphan".to_string()),
                None,
            ],
        )
        .unwrap();
        assert_eq!(
            column.observed_levels(),
            vec![(1, "Low".to_string()), (2, "High".to_string())]
        );
    }
}
