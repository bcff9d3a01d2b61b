//! Per-year value-label definitions.
//!
//! A [`LabelSet`] holds everything parsed from one year's definition script:
//! the code→description lists of categorical variables, the names of variables
//! that only declared sentinels (pass-through numeric), and short variable
//! descriptions.
//!
//! Classification is decided here, once, when a declaration group is inserted.
//! Downstream stages ask [`LabelSet::classify`] rather than inspecting values.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sentinel::Sentinel;

/// Apostrophe look-alikes that appear in descriptions across years.
const APOSTROPHE_VARIANTS: &[char] = &['\u{2019}', '\u{2018}', '\u{02BC}', '\u{201B}', '\u{2032}', '`'];

/// Replaces curly and modifier apostrophes with `'`.
///
/// Recodes compare descriptions by equality, so "Don’t know" and "Don't know"
/// must be the same string.
pub fn normalize_apostrophes(text: &str) -> String {
    text.chars()
        .map(|ch| if APOSTROPHE_VARIANTS.contains(&ch) { '\'' } else { ch })
        .collect()
}

/// A declared code: a real value or one of the four sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelCode {
    Value(i64),
    Sentinel(Sentinel),
}

impl LabelCode {
    /// Parses a declaration code (`3`, `-1`, `.m`). Sentinel numbers stay sentinels.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(sentinel) = Sentinel::from_token(raw) {
            return Some(LabelCode::Sentinel(sentinel));
        }
        let value: i64 = raw.parse().ok()?;
        Some(Self::from_numeric(value))
    }

    pub fn from_numeric(value: i64) -> Self {
        match Sentinel::from_code(value) {
            Some(sentinel) => LabelCode::Sentinel(sentinel),
            None => LabelCode::Value(value),
        }
    }

    /// The code as it appears in the converted yearly tables.
    pub fn numeric(self) -> i64 {
        match self {
            LabelCode::Value(v) => v,
            LabelCode::Sentinel(s) => s.code(),
        }
    }

    pub fn is_sentinel(self) -> bool {
        matches!(self, LabelCode::Sentinel(_))
    }
}

impl fmt::Display for LabelCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelCode::Value(v) => write!(f, "{v}"),
            LabelCode::Sentinel(s) => f.write_str(s.token()),
        }
    }
}

/// One declared (variable, code, description) triple for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub variable: String,
    pub code: LabelCode,
    pub description: String,
}

/// How a variable's raw values are treated for one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableClass {
    /// Raw codes map to a closed set of descriptions.
    Categorical,
    /// Raw value is used as a number; sentinels become null.
    PassThrough,
}

impl VariableClass {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableClass::Categorical => "categorical",
            VariableClass::PassThrough => "pass_through",
        }
    }
}

/// All declarations for one variable in one year, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueLabels {
    pub variable: String,
    definitions: Vec<LabelDefinition>,
    by_code: BTreeMap<i64, usize>,
}

impl ValueLabels {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            definitions: Vec::new(),
            by_code: BTreeMap::new(),
        }
    }

    /// Adds a declaration. Returns the code back if it was already declared.
    pub fn insert(&mut self, code: LabelCode, description: impl Into<String>) -> Result<(), LabelCode> {
        let key = code.numeric();
        if self.by_code.contains_key(&key) {
            return Err(code);
        }
        self.by_code.insert(key, self.definitions.len());
        self.definitions.push(LabelDefinition {
            variable: self.variable.clone(),
            code,
            description: description.into(),
        });
        Ok(())
    }

    pub fn definitions(&self) -> &[LabelDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// True when at least one declared code is a real value.
    pub fn has_real_values(&self) -> bool {
        self.definitions.iter().any(|d| !d.code.is_sentinel())
    }

    /// Description for a raw numeric code.
    pub fn description_for(&self, code: i64) -> Option<&str> {
        self.by_code
            .get(&code)
            .map(|&idx| self.definitions[idx].description.as_str())
    }

    /// First code declared with this description.
    pub fn code_for(&self, description: &str) -> Option<LabelCode> {
        self.definitions
            .iter()
            .find(|d| d.description == description)
            .map(|d| d.code)
    }
}

/// Parsed label definitions for one survey year.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSet {
    pub year: u16,
    categorical: BTreeMap<String, ValueLabels>,
    pass_through: BTreeSet<String>,
    variable_descriptions: BTreeMap<String, String>,
}

impl LabelSet {
    pub fn new(year: u16) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }

    /// Files a declaration group under its classification and returns it.
    ///
    /// Sentinel-only groups are recorded as pass-through and their
    /// definitions dropped; they are never applied later.
    pub fn insert_group(&mut self, labels: ValueLabels) -> VariableClass {
        let name = labels.variable.clone();
        if labels.has_real_values() {
            self.pass_through.remove(&name);
            self.categorical.insert(name, labels);
            VariableClass::Categorical
        } else {
            self.pass_through.insert(name);
            VariableClass::PassThrough
        }
    }

    pub fn set_variable_description(&mut self, variable: impl Into<String>, text: impl Into<String>) {
        self.variable_descriptions.insert(variable.into(), text.into());
    }

    /// Undeclared variables are pass-through.
    pub fn classify(&self, variable: &str) -> VariableClass {
        if self.categorical.contains_key(variable) {
            VariableClass::Categorical
        } else {
            VariableClass::PassThrough
        }
    }

    pub fn value_labels(&self, variable: &str) -> Option<&ValueLabels> {
        self.categorical.get(variable)
    }

    pub fn categorical(&self) -> impl Iterator<Item = &ValueLabels> {
        self.categorical.values()
    }

    pub fn pass_through(&self) -> impl Iterator<Item = &str> {
        self.pass_through.iter().map(String::as_str)
    }

    pub fn variable_description(&self, variable: &str) -> Option<&str> {
        self.variable_descriptions.get(variable).map(String::as_str)
    }

    /// Every variable the script mentions, in name order.
    pub fn variables(&self) -> BTreeSet<&str> {
        self.categorical
            .keys()
            .chain(self.pass_through.iter())
            .chain(self.variable_descriptions.keys())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(variable: &str, entries: &[(LabelCode, &str)]) -> ValueLabels {
        let mut out = ValueLabels::new(variable);
        for (code, text) in entries {
            out.insert(*code, *text).unwrap();
        }
        out
    }

    #[test]
    fn apostrophes_collapse_to_ascii() {
        assert_eq!(normalize_apostrophes("Don\u{2019}t know"), "Don't know");
        assert_eq!(normalize_apostrophes("child`s"), "child's");
        assert_eq!(normalize_apostrophes("plain"), "plain");
    }

    #[test]
    fn parse_codes() {
        assert_eq!(LabelCode::parse("3"), Some(LabelCode::Value(3)));
        assert_eq!(LabelCode::parse("-1"), Some(LabelCode::Value(-1)));
        assert_eq!(
            LabelCode::parse(".l"),
            Some(LabelCode::Sentinel(Sentinel::LogicalSkip))
        );
        assert_eq!(
            LabelCode::parse("999"),
            Some(LabelCode::Sentinel(Sentinel::Suppressed))
        );
        assert_eq!(LabelCode::parse("x"), None);
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut l = ValueLabels::new("sc_sex");
        l.insert(LabelCode::Value(1), "Male").unwrap();
        assert_eq!(l.insert(LabelCode::Value(1), "Female"), Err(LabelCode::Value(1)));
        // `.m` and 996 are the same code
        l.insert(LabelCode::Sentinel(Sentinel::NoValidResponse), "No valid response")
            .unwrap();
        assert!(l.insert(LabelCode::from_numeric(996), "again").is_err());
    }

    #[test]
    fn sentinel_only_groups_are_pass_through() {
        let mut set = LabelSet::new(2016);
        let class = set.insert_group(labels(
            "bmi",
            &[(LabelCode::Sentinel(Sentinel::LogicalSkip), "Logical skip")],
        ));
        assert_eq!(class, VariableClass::PassThrough);
        assert!(set.value_labels("bmi").is_none());
        assert_eq!(set.pass_through().collect::<Vec<_>>(), vec!["bmi"]);

        let class = set.insert_group(labels(
            "sc_sex",
            &[
                (LabelCode::Value(1), "Male"),
                (LabelCode::Value(2), "Female"),
                (LabelCode::Sentinel(Sentinel::NoValidResponse), "No valid response"),
            ],
        ));
        assert_eq!(class, VariableClass::Categorical);
        assert_eq!(set.classify("sc_sex"), VariableClass::Categorical);
        assert_eq!(set.classify("never_declared"), VariableClass::PassThrough);
        let sex = set.value_labels("sc_sex").unwrap();
        assert_eq!(sex.description_for(996), Some("No valid response"));
        assert_eq!(sex.code_for("Female"), Some(LabelCode::Value(2)));
    }
}
