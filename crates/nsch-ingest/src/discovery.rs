//! Locating each survey year's input files.
//!
//! Files are matched by a `_<year>_` token in their stem, so
//! `nsch_2019_topical.csv` and `nsch_2019_topical.do` both belong to 2019.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IngestError, Result};

/// Extension of the yearly extracts.
pub const DATA_EXTENSION: &str = "csv";
/// Extension of the yearly label-definition scripts.
pub const LABELS_EXTENSION: &str = "do";

/// The two inputs of one survey year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearFiles {
    pub year: u16,
    pub data: PathBuf,
    pub labels: PathBuf,
}

/// Lists files in `dir` with the given extension (case-insensitive), sorted by name.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Survey year named by a file stem, if any `_`-separated token is a year.
pub fn year_of(path: &Path) -> Option<u16> {
    let stem = path.file_stem()?.to_str()?;
    stem.split(['_', '-', '.'])
        .filter(|token| token.len() == 4)
        .find_map(|token| token.parse::<u16>().ok())
        .filter(|year| (1900..=2100).contains(year))
}

/// Picks exactly one file per requested year.
fn match_years(
    files: &[PathBuf],
    years: &[u16],
    kind: &'static str,
    dir: &Path,
) -> Result<BTreeMap<u16, PathBuf>> {
    let mut by_year: BTreeMap<u16, Vec<&PathBuf>> = BTreeMap::new();
    for path in files {
        if let Some(year) = year_of(path) {
            by_year.entry(year).or_default().push(path);
        }
    }

    let mut out = BTreeMap::new();
    for &year in years {
        match by_year.get(&year).map(Vec::as_slice) {
            None | Some([]) => {
                return Err(IngestError::MissingYear {
                    year,
                    kind,
                    dir: dir.to_path_buf(),
                });
            }
            Some([single]) => {
                out.insert(year, (*single).clone());
            }
            Some(many) => {
                return Err(IngestError::AmbiguousYear {
                    year,
                    kind,
                    count: many.len(),
                    first: many[0].clone(),
                    second: many[1].clone(),
                });
            }
        }
    }
    Ok(out)
}

/// Finds the extract and label script for every requested year.
///
/// A year without both files fails the whole discovery.
pub fn discover_year_files(dir: &Path, years: &[u16]) -> Result<Vec<YearFiles>> {
    let data = match_years(&list_files(dir, DATA_EXTENSION)?, years, "data", dir)?;
    let labels = match_years(&list_files(dir, LABELS_EXTENSION)?, years, "label", dir)?;

    let files: Vec<YearFiles> = data
        .into_iter()
        .filter_map(|(year, data)| {
            labels.get(&year).map(|labels| YearFiles {
                year,
                data,
                labels: labels.clone(),
            })
        })
        .collect();
    debug!(dir = %dir.display(), years = files.len(), "discovered yearly inputs");
    Ok(files)
}
