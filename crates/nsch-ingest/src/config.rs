//! Loading the harmonization configuration.

use std::path::Path;

use tracing::debug;

use nsch_model::TransformationSpec;

use crate::error::{IngestError, Result};

/// Reads, normalizes and validates a JSON [`TransformationSpec`].
pub fn load_transformation_spec(path: &Path) -> Result<TransformationSpec> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let spec = parse_transformation_spec(&text).map_err(|source| IngestError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    spec.validate().map_err(|e| IngestError::InvalidConfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!(
        path = %path.display(),
        desired = spec.desired_variables.len(),
        transforms = spec.transform.len(),
        renames = spec.rename_columns.len(),
        merges = spec.merge_columns.len(),
        "loaded transformation spec"
    );
    Ok(spec)
}

/// Parses and normalizes configuration text without validating it.
pub fn parse_transformation_spec(text: &str) -> serde_json::Result<TransformationSpec> {
    serde_json::from_str::<TransformationSpec>(text).map(TransformationSpec::normalized)
}
