use std::collections::BTreeMap;

use nsch_model::WarningKind;
use nsch_transform::YearSummary;

use nsch_cli::pipeline::OutputPaths;

#[derive(Debug)]
pub struct RunResult {
    pub outputs: OutputPaths,
    pub rows: usize,
    pub variables: usize,
    pub factors: usize,
    pub years: Vec<YearSummary>,
    pub warnings: BTreeMap<WarningKind, usize>,
    /// Warnings were recorded and `--fail-on-warnings` was set.
    pub failed: bool,
}

impl RunResult {
    pub fn warning_count(&self) -> usize {
        self.warnings.values().sum()
    }
}
