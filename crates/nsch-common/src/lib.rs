//! Shared utilities for the NSCH harmonization crates.

pub mod polars;

pub use polars::{FractionalKey, format_numeric, key_text, parse_f64};
