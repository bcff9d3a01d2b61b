//! Input loading for the NSCH harmonization pipeline.
//!
//! Each survey year contributes a label-definition script and a raw extract;
//! this crate turns them into a [`LabelSet`](nsch_model::LabelSet) and an
//! all-numeric [`YearTable`](nsch_model::YearTable), and loads the run's
//! configuration and side table.

pub mod config;
pub mod discovery;
pub mod error;
pub mod labels;
pub mod raw_table;
pub mod side_table;

pub use config::{load_transformation_spec, parse_transformation_spec};
pub use discovery::{YearFiles, discover_year_files, list_files, year_of};
pub use error::{IngestError, Result};
pub use labels::{parse_label_definitions, read_label_definitions};
pub use raw_table::{RawYearTable, read_year_table, year_table_from_frame};
pub use side_table::read_side_table;
