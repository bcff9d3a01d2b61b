//! Error taxonomy for the harmonization pipeline.
//!
//! Fatal conditions are errors; everything non-fatal is an
//! [`AuditWarning`](crate::audit::AuditWarning) accumulated for the run report.

use thiserror::Error;

/// Label-definition text does not follow the declaration grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed label definitions for {year} at byte {offset}: {reason} (`{line}`)")]
pub struct ParseError {
    pub year: u16,
    /// Byte offset of the offending line within the source text.
    pub offset: usize,
    pub line: String,
    pub reason: String,
}

/// Years disagree on a variable in a way reconciliation cannot absorb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatchError {
    #[error("{variable}: levels `{first}` and `{second}` differ only in spelling")]
    NearDuplicateLevels {
        variable: String,
        first: String,
        second: String,
    },

    #[error("{variable}: levels observed in {year} ({levels:?}) share nothing with other years")]
    DisjointVocabulary {
        variable: String,
        year: u16,
        levels: Vec<String>,
    },

    #[error(
        "{variable}: categorical in {categorical_years:?} but pass-through numeric in {numeric_years:?}"
    )]
    ClassificationDrift {
        variable: String,
        categorical_years: Vec<u16>,
        numeric_years: Vec<u16>,
    },
}

impl SchemaMismatchError {
    pub fn variable(&self) -> &str {
        match self {
            SchemaMismatchError::NearDuplicateLevels { variable, .. }
            | SchemaMismatchError::DisjointVocabulary { variable, .. }
            | SchemaMismatchError::ClassificationDrift { variable, .. } => variable,
        }
    }
}

/// The side table's key is not unique per household.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("side table key `{key}` has {duplicate_keys} duplicated value(s), e.g. {examples:?}")]
pub struct JoinCardinalityError {
    pub key: String,
    pub duplicate_keys: usize,
    pub examples: Vec<String>,
}

/// Structural problems with an in-memory table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column `{column}` has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Umbrella error for a harmonization run.
#[derive(Debug, Error)]
pub enum HarmonizeError {
    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaMismatchError),

    #[error("join cardinality: {0}")]
    JoinCardinality(#[from] JoinCardinalityError),

    #[error("household key `{key}` has non-integral value {value} in the {table}")]
    InvalidKey {
        key: String,
        table: &'static str,
        value: String,
    },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarmonizeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn data_frame(error: impl std::fmt::Display) -> Self {
        Self::DataFrame {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarmonizeError>;
