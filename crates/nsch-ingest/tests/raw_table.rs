//! Tests for reading yearly extracts.

use std::io::Write;

use nsch_ingest::{IngestError, read_year_table};
use nsch_model::WarningKind;
use tempfile::NamedTempFile;

fn csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{content}").expect("write csv");
    file
}

#[test]
fn converts_tokens_stratum_and_junk() {
    let file = csv("HHID,Stratum,K2Q01,SC_AGE\n1,1,1,4\n2,2A,.m,oops\n3,2a,.l,\n");
    let raw = read_year_table(file.path(), 2019).expect("read");
    let table = &raw.table;

    assert_eq!(table.year, 2019);
    assert_eq!(table.height(), 3);
    let names: Vec<&str> = table.names().collect();
    assert_eq!(names, vec!["hhid", "k2q01", "sc_age", "stratum"]);

    let stratum = table.get("stratum").and_then(|c| c.as_numeric()).unwrap();
    assert_eq!(stratum, &[Some(1.0), Some(2.0), Some(2.0)]);
    let k2q01 = table.get("k2q01").and_then(|c| c.as_numeric()).unwrap();
    assert_eq!(k2q01, &[Some(1.0), Some(996.0), Some(998.0)]);
    let age = table.get("sc_age").and_then(|c| c.as_numeric()).unwrap();
    assert_eq!(age, &[Some(4.0), None, None]);

    assert_eq!(raw.warnings.len(), 1);
    let warning = &raw.warnings[0];
    assert_eq!(warning.kind, WarningKind::CoercedValue);
    assert_eq!(warning.variable.as_deref(), Some("sc_age"));
    assert_eq!(warning.value.as_deref(), Some("oops"));
    assert_eq!(warning.count, 1);
}

#[test]
fn duplicate_headers_after_case_folding_fail() {
    let file = csv("a,A\n1,2\n");
    let result = read_year_table(file.path(), 2016);
    assert!(result.is_err());
}

#[test]
fn missing_file_is_a_csv_error() {
    let result = read_year_table(std::path::Path::new("/nonexistent/nsch_2016.csv"), 2016);
    assert!(matches!(result, Err(IngestError::CsvParse { .. })));
}
