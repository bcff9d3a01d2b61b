//! Harmonization stages for the NSCH yearly extracts.
//!
//! - **sentinel**: missing-data sentinels on numeric and categorical columns
//! - **apply**: attaching value labels to raw codes
//! - **engine**: year-scoped recode, rename and merge
//! - **reconcile**: subsetting to the canonical schema and building the cross-year factor schema
//! - **assemble**: stacking years, state names and the side-table join
//! - **output**: CSV, codebook and audit report writers
//! - **pipeline**: the per-year parallel run

pub mod apply;
pub mod assemble;
pub mod engine;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod sentinel;

pub use apply::{ApplySummary, apply_labels, label_column, lookup_code};
pub use assemble::{
    CanonicalTable, STATE_COLUMN, YEAR_COLUMN, assemble, check_key_uniqueness, concat_years,
    household_keys, join_side_table,
};
pub use engine::{
    apply_transform, coalesce, merge_columns, recode_column, rename_column, transform_year,
};
pub use output::{write_audit_report, write_canonical_csv, write_codebook};
pub use pipeline::{HarmonizeOutput, YearInput, YearSummary, finish, harmonize, process_year};
pub use reconcile::{
    FactorSchema, ReconciledYear, SchemaEntry, VariableKind, reconcile_schema, reconcile_year,
};
pub use sentinel::{collapse_sentinel_levels, null_numeric_sentinels};
