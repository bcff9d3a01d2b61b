//! Harmonization configuration.
//!
//! [`TransformationSpec`] is read once per run and handed by reference to every
//! stage. It names the canonical output schema and the per-year recodes,
//! renames and merges that bring each year onto that schema.
//!
//! ```json
//! {
//!   "desired_variables": ["fipsst", "hhid", "sc_sex", "education_level"],
//!   "transform": {
//!     "k2q01": { "years": [2016], "value": [1, 2], "new_value": [2, 3], "new_label": ["B", "C"] }
//!   },
//!   "rename_columns": { "grade": { "years": [2016], "new_name": "education_level" } },
//!   "merge_columns": { "k4q20r": { "years": [2017], "column_1": "k4q20", "column_2": "k4q20_r" } }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::HarmonizeError;
use crate::labels::normalize_apostrophes;

pub const DEFAULT_HOUSEHOLD_KEY: &str = "hhid";
pub const DEFAULT_STATE_CODE_COLUMN: &str = "fipsst";

fn default_household_key() -> String {
    DEFAULT_HOUSEHOLD_KEY.to_string()
}

fn default_state_code_column() -> String {
    DEFAULT_STATE_CODE_COLUMN.to_string()
}

/// A single entry or a list of entries under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }

    fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_mut(item).iter_mut(),
            OneOrMany::Many(items) => items.iter_mut(),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// A value on either side of a substitution: a raw code or a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformValue {
    Code(f64),
    Label(String),
}

impl TransformValue {
    /// Integral codes only; used for categorical columns.
    pub fn as_code(&self) -> Option<i64> {
        match self {
            TransformValue::Code(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            TransformValue::Code(v) => Some(*v),
            TransformValue::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            TransformValue::Label(s) => Some(s),
            TransformValue::Code(_) => None,
        }
    }
}

/// `transform[var]`: ordered substitutions for a set of years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformEntry {
    pub years: Vec<u16>,
    pub value: Vec<TransformValue>,
    #[serde(default)]
    pub new_value: Vec<TransformValue>,
    #[serde(default)]
    pub new_label: Vec<String>,
}

/// One step of a transform entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub old: TransformValue,
    pub new_value: Option<TransformValue>,
    pub new_label: Option<String>,
}

impl TransformEntry {
    pub fn applies_to(&self, year: u16) -> bool {
        self.years.contains(&year)
    }

    /// Substitutions in array order.
    pub fn substitutions(&self) -> Vec<Substitution> {
        self.value
            .iter()
            .enumerate()
            .map(|(idx, old)| Substitution {
                old: old.clone(),
                new_value: self.new_value.get(idx).cloned(),
                new_label: self.new_label.get(idx).cloned(),
            })
            .collect()
    }
}

/// `rename_columns[old]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameEntry {
    pub years: Vec<u16>,
    pub new_name: String,
}

impl RenameEntry {
    pub fn applies_to(&self, year: u16) -> bool {
        self.years.contains(&year)
    }
}

/// `merge_columns[new]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeEntry {
    pub years: Vec<u16>,
    pub column_1: String,
    pub column_2: String,
}

impl MergeEntry {
    pub fn applies_to(&self, year: u16) -> bool {
        self.years.contains(&year)
    }
}

/// The full configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationSpec {
    /// Canonical output schema, in output order.
    pub desired_variables: Vec<String>,
    #[serde(default)]
    pub transform: BTreeMap<String, OneOrMany<TransformEntry>>,
    #[serde(default)]
    pub rename_columns: BTreeMap<String, OneOrMany<RenameEntry>>,
    #[serde(default)]
    pub merge_columns: BTreeMap<String, OneOrMany<MergeEntry>>,
    /// Post-hoc collapses: `variable -> {level -> broader level}`.
    #[serde(default)]
    pub level_collapses: BTreeMap<String, BTreeMap<String, String>>,
    /// Years in which a categorical variable is known to arrive without labels.
    #[serde(default)]
    pub numeric_fallback: BTreeMap<String, Vec<u16>>,
    #[serde(default = "default_household_key")]
    pub household_key: String,
    #[serde(default = "default_state_code_column")]
    pub state_code_column: String,
}

impl Default for TransformationSpec {
    fn default() -> Self {
        Self {
            desired_variables: Vec::new(),
            transform: BTreeMap::new(),
            rename_columns: BTreeMap::new(),
            merge_columns: BTreeMap::new(),
            level_collapses: BTreeMap::new(),
            numeric_fallback: BTreeMap::new(),
            household_key: default_household_key(),
            state_code_column: default_state_code_column(),
        }
    }
}

impl TransformationSpec {
    /// Lowercases variable names and normalizes apostrophes in labels so the
    /// configuration matches parsed definitions byte for byte.
    pub fn normalized(mut self) -> Self {
        self.desired_variables = self
            .desired_variables
            .iter()
            .map(|v| v.trim().to_lowercase())
            .collect();
        self.transform = std::mem::take(&mut self.transform)
            .into_iter()
            .map(|(name, mut entries)| {
                for entry in entries.iter_mut() {
                    for value in entry.value.iter_mut().chain(entry.new_value.iter_mut()) {
                        if let TransformValue::Label(label) = value {
                            *label = normalize_apostrophes(label);
                        }
                    }
                    for label in &mut entry.new_label {
                        *label = normalize_apostrophes(label);
                    }
                }
                (name.to_lowercase(), entries)
            })
            .collect();
        self.rename_columns = std::mem::take(&mut self.rename_columns)
            .into_iter()
            .map(|(name, mut entries)| {
                for entry in entries.iter_mut() {
                    entry.new_name = entry.new_name.to_lowercase();
                }
                (name.to_lowercase(), entries)
            })
            .collect();
        self.merge_columns = std::mem::take(&mut self.merge_columns)
            .into_iter()
            .map(|(name, mut entries)| {
                for entry in entries.iter_mut() {
                    entry.column_1 = entry.column_1.to_lowercase();
                    entry.column_2 = entry.column_2.to_lowercase();
                }
                (name.to_lowercase(), entries)
            })
            .collect();
        self.level_collapses = std::mem::take(&mut self.level_collapses)
            .into_iter()
            .map(|(name, map)| {
                let map = map
                    .into_iter()
                    .map(|(from, into)| (normalize_apostrophes(&from), normalize_apostrophes(&into)))
                    .collect();
                (name.to_lowercase(), map)
            })
            .collect();
        self.numeric_fallback = std::mem::take(&mut self.numeric_fallback)
            .into_iter()
            .map(|(name, years)| (name.to_lowercase(), years))
            .collect();
        self.household_key = self.household_key.to_lowercase();
        self.state_code_column = self.state_code_column.to_lowercase();
        self
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<(), HarmonizeError> {
        if self.desired_variables.is_empty() {
            return Err(HarmonizeError::config("desired_variables is empty"));
        }
        let mut seen = BTreeSet::new();
        for name in &self.desired_variables {
            if !seen.insert(name.as_str()) {
                return Err(HarmonizeError::config(format!(
                    "desired_variables lists `{name}` twice"
                )));
            }
        }
        for (name, entries) in &self.transform {
            for entry in entries.iter() {
                if entry.new_value.is_empty() && entry.new_label.is_empty() {
                    return Err(HarmonizeError::config(format!(
                        "transform `{name}` has neither new_value nor new_label"
                    )));
                }
                for (field, len) in [
                    ("new_value", entry.new_value.len()),
                    ("new_label", entry.new_label.len()),
                ] {
                    if len != 0 && len != entry.value.len() {
                        return Err(HarmonizeError::config(format!(
                            "transform `{name}`: {field} has {len} item(s), value has {}",
                            entry.value.len()
                        )));
                    }
                }
            }
        }
        for (name, entries) in &self.merge_columns {
            for entry in entries.iter() {
                if entry.column_1 == entry.column_2 {
                    return Err(HarmonizeError::config(format!(
                        "merge `{name}` names `{}` twice",
                        entry.column_1
                    )));
                }
            }
        }
        for (name, map) in &self.level_collapses {
            for (from, into) in map {
                if map.contains_key(into) {
                    return Err(HarmonizeError::config(format!(
                        "level_collapses `{name}`: `{from}` collapses into `{into}`, which itself collapses"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn transforms_for(&self, year: u16) -> impl Iterator<Item = (&str, &TransformEntry)> {
        self.transform.iter().flat_map(move |(name, entries)| {
            entries
                .iter()
                .filter(move |e| e.applies_to(year))
                .map(move |e| (name.as_str(), e))
        })
    }

    pub fn renames_for(&self, year: u16) -> impl Iterator<Item = (&str, &RenameEntry)> {
        self.rename_columns.iter().flat_map(move |(name, entries)| {
            entries
                .iter()
                .filter(move |e| e.applies_to(year))
                .map(move |e| (name.as_str(), e))
        })
    }

    pub fn merges_for(&self, year: u16) -> impl Iterator<Item = (&str, &MergeEntry)> {
        self.merge_columns.iter().flat_map(move |(name, entries)| {
            entries
                .iter()
                .filter(move |e| e.applies_to(year))
                .map(move |e| (name.as_str(), e))
        })
    }

    pub fn allows_numeric_fallback(&self, variable: &str, year: u16) -> bool {
        self.numeric_fallback
            .get(variable)
            .is_some_and(|years| years.contains(&year))
    }

    pub fn is_desired(&self, variable: &str) -> bool {
        self.desired_variables.iter().any(|v| v == variable)
    }
}
