//! Tests for yearly file discovery and configuration loading.

use std::fs;
use std::path::Path;

use nsch_ingest::{IngestError, discover_year_files, load_transformation_spec, read_side_table};
use tempfile::TempDir;

fn touch(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("write file");
}

#[test]
fn pairs_data_and_label_files_by_year() {
    let dir = TempDir::new().expect("temp dir");
    touch(dir.path(), "nsch_2016_topical.csv", "a\n1\n");
    touch(dir.path(), "nsch_2016_topical.do", "");
    touch(dir.path(), "nsch_2017_topical.CSV", "a\n1\n");
    touch(dir.path(), "nsch_2017_topical.do", "");
    touch(dir.path(), "readme.txt", "");

    let files = discover_year_files(dir.path(), &[2016, 2017]).expect("discover");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].year, 2016);
    assert!(files[0].data.ends_with("nsch_2016_topical.csv"));
    assert!(files[1].labels.ends_with("nsch_2017_topical.do"));
}

#[test]
fn missing_year_fails() {
    let dir = TempDir::new().expect("temp dir");
    touch(dir.path(), "nsch_2016_topical.csv", "a\n1\n");
    touch(dir.path(), "nsch_2016_topical.do", "");

    let err = discover_year_files(dir.path(), &[2016, 2018]).unwrap_err();
    assert!(matches!(err, IngestError::MissingYear { year: 2018, .. }));
}

#[test]
fn ambiguous_year_fails() {
    let dir = TempDir::new().expect("temp dir");
    touch(dir.path(), "nsch_2016_topical.csv", "a\n1\n");
    touch(dir.path(), "nsch_2016_screener.csv", "a\n1\n");
    touch(dir.path(), "nsch_2016_topical.do", "");

    let err = discover_year_files(dir.path(), &[2016]).unwrap_err();
    assert!(matches!(err, IngestError::AmbiguousYear { count: 2, .. }));
}

#[test]
fn loads_and_validates_config() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("spec.json");
    fs::write(
        &path,
        r#"{"desired_variables": ["FIPSST", "HHID", "Grade"],
            "rename_columns": {"GRADE": {"years": [2016], "new_name": "Education_Level"}}}"#,
    )
    .expect("write config");

    let spec = load_transformation_spec(&path).expect("load");
    assert_eq!(spec.desired_variables, vec!["fipsst", "hhid", "grade"]);
    let (old, entry) = spec.renames_for(2016).next().expect("rename");
    assert_eq!(old, "grade");
    assert_eq!(entry.new_name, "education_level");

    fs::write(&path, r#"{"desired_variables": []}"#).expect("write config");
    let err = load_transformation_spec(&path).unwrap_err();
    assert!(matches!(err, IngestError::InvalidConfig { .. }));

    fs::write(&path, "{not json").expect("write config");
    let err = load_transformation_spec(&path).unwrap_err();
    assert!(matches!(err, IngestError::ConfigParse { .. }));
}

#[test]
fn side_table_headers_are_lowercased() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("derived.csv");
    fs::write(&path, "HHID,Poverty\n10,1\n11,2\n").expect("write csv");

    let df = read_side_table(&path, "hhid").expect("read side table");
    assert_eq!(df.height(), 2);
    assert!(df.column("poverty").is_ok());

    let err = read_side_table(&path, "household").unwrap_err();
    assert!(matches!(err, IngestError::MissingColumn { .. }));
}
