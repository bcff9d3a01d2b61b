//! Non-fatal findings collected over a run.
//!
//! Every silent fallback in the pipeline leaves an [`AuditWarning`] here, and
//! the CLI writes the sorted [`AuditReport`] next to the canonical table.

use serde::{Deserialize, Serialize};

/// How much attention a warning needs during audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Values were lost or guessed.
    Warning,
    /// Expected shape differences between years.
    Info,
}

/// What kind of non-fatal condition was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Raw value with no declared label and no sentinel match; nulled.
    UnmappedCode,
    /// Raw cell that could not be read as a number; nulled.
    CoercedValue,
    /// Categorical variable arrived without descriptions; kept numeric.
    MissingDescriptions,
    /// Configuration entry did not apply to this year's columns.
    NotApplicable,
    /// A rename landed on a column that already existed; the old one is gone.
    RenameOverwrite,
    /// Allow-listed numeric year decoded through other years' labels, or dropped.
    NumericFallback,
    /// Desired variable absent for a year; filled with nulls.
    MissingVariable,
    /// Rows without a side-table match were dropped at the join.
    JoinDropped,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningKind::UnmappedCode => "unmapped_code",
            WarningKind::CoercedValue => "coerced_value",
            WarningKind::MissingDescriptions => "missing_descriptions",
            WarningKind::NotApplicable => "not_applicable",
            WarningKind::RenameOverwrite => "rename_overwrite",
            WarningKind::NumericFallback => "numeric_fallback",
            WarningKind::MissingVariable => "missing_variable",
            WarningKind::JoinDropped => "join_dropped",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            WarningKind::NotApplicable | WarningKind::MissingVariable => Severity::Info,
            WarningKind::UnmappedCode
            | WarningKind::CoercedValue
            | WarningKind::MissingDescriptions
            | WarningKind::RenameOverwrite
            | WarningKind::NumericFallback
            | WarningKind::JoinDropped => Severity::Warning,
        }
    }
}

/// A non-fatal condition surfaced at the end of the run for manual audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    pub kind: WarningKind,
    pub severity: Severity,
    pub year: Option<u16>,
    pub variable: Option<String>,
    /// Offending raw value, when there is one.
    pub value: Option<String>,
    /// Rows affected.
    pub count: u64,
    pub message: String,
}

impl AuditWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            year: None,
            variable: None,
            value: None,
            count: 0,
            message: message.into(),
        }
    }

    pub fn unmapped_code(year: u16, variable: &str, code: &str, count: u64) -> Self {
        Self {
            kind: WarningKind::UnmappedCode,
            severity: Severity::Warning,
            year: Some(year),
            variable: Some(variable.to_string()),
            value: Some(code.to_string()),
            count,
            message: format!("code {code} has no label in {year}; set to null"),
        }
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }
}

/// Warnings accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub warnings: Vec<AuditWarning>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: AuditWarning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = AuditWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn count_kind(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Warning counts per kind, in kind order.
    pub fn counts_by_kind(&self) -> std::collections::BTreeMap<WarningKind, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for warning in &self.warnings {
            *counts.entry(warning.kind).or_default() += 1;
        }
        counts
    }

    pub fn for_year(&self, year: u16) -> impl Iterator<Item = &AuditWarning> {
        self.warnings.iter().filter(move |w| w.year == Some(year))
    }

    /// Stable order for reporting: year, kind, variable, value.
    pub fn sort(&mut self) {
        self.warnings.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.variable.cmp(&b.variable))
                .then_with(|| a.value.cmp(&b.value))
        });
    }
}
