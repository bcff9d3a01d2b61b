//! Data model for harmonizing the yearly NSCH topical extracts.

pub mod audit;
pub mod config;
pub mod error;
pub mod geography;
pub mod labels;
pub mod lookup;
pub mod sentinel;
pub mod table;

pub use audit::{AuditReport, AuditWarning, Severity, WarningKind};
pub use config::{
    MergeEntry, OneOrMany, RenameEntry, Substitution, TransformEntry, TransformValue,
    TransformationSpec,
};
pub use error::{
    HarmonizeError, JoinCardinalityError, ParseError, Result, SchemaMismatchError, TableError,
};
pub use geography::state_name;
pub use labels::{
    LabelCode, LabelDefinition, LabelSet, ValueLabels, VariableClass, normalize_apostrophes,
};
pub use lookup::LookupResult;
pub use sentinel::{Missingness, Sentinel};
pub use table::{CategoricalColumn, Column, YearTable};

/// Survey years the pipeline harmonizes.
pub const SURVEY_YEARS: std::ops::RangeInclusive<u16> = 2016..=2022;
