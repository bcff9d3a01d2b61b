//! CLI library components for the NSCH harmonizer.

pub mod logging;
pub mod pipeline;
