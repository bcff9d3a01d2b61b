//! Cross-year reconciliation, assembly and output.

use polars::prelude::*;

use nsch_model::{
    Column as TableColumn, HarmonizeError, JoinCardinalityError, LabelCode, LabelSet,
    SchemaMismatchError, TransformationSpec, ValueLabels, WarningKind, YearTable,
};
use nsch_transform::{
    YearInput, harmonize, join_side_table, write_audit_report, write_canonical_csv, write_codebook,
};

fn value_labels(variable: &str, entries: &[(i64, &str)]) -> ValueLabels {
    let mut labels = ValueLabels::new(variable);
    for (code, text) in entries {
        labels
            .insert(LabelCode::from_numeric(*code), *text)
            .expect("unique code");
    }
    labels
}

fn table(year: u16, columns: &[(&str, &[f64])]) -> YearTable {
    let height = columns.first().map_or(0, |(_, values)| values.len());
    let mut table = YearTable::new(year, height);
    for (name, values) in columns {
        table
            .insert(
                *name,
                TableColumn::Numeric(values.iter().copied().map(Some).collect()),
            )
            .expect("same height");
    }
    table
}

fn spec(json: &str) -> TransformationSpec {
    let spec = serde_json::from_str::<TransformationSpec>(json)
        .expect("parse spec")
        .normalized();
    spec.validate().expect("valid spec");
    spec
}

fn strings(frame: &DataFrame, name: &str) -> Vec<Option<String>> {
    frame
        .column(name)
        .unwrap()
        .str()
        .unwrap()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

/// 2016 calls the variable `grade` with two levels; 2017 renamed it and
/// added a middle level.
fn grade_years() -> (Vec<YearInput>, TransformationSpec) {
    let mut labels_2016 = LabelSet::new(2016);
    labels_2016.insert_group(value_labels("grade", &[(1, "Low"), (2, "High"), (996, "No valid response")]));
    let data_2016 = table(
        2016,
        &[
            ("hhid", &[1.0, 2.0, 3.0]),
            ("fipsst", &[6.0, 36.0, 6.0]),
            ("grade", &[1.0, 2.0, 996.0]),
        ],
    );

    let mut labels_2017 = LabelSet::new(2017);
    labels_2017.insert_group(value_labels(
        "education_level",
        &[(1, "Low"), (2, "Mid"), (3, "High")],
    ));
    labels_2017.set_variable_description("education_level", "Highest grade completed");
    let data_2017 = table(
        2017,
        &[
            ("hhid", &[4.0, 5.0, 6.0]),
            ("fipsst", &[6.0, 48.0, 1.0]),
            ("education_level", &[1.0, 2.0, 3.0]),
        ],
    );

    let spec = spec(
        r#"{
            "desired_variables": ["hhid", "fipsst", "education_level"],
            "rename_columns": {"grade": {"years": [2016], "new_name": "education_level"}}
        }"#,
    );
    (
        vec![
            YearInput::new(labels_2017, data_2017),
            YearInput::new(labels_2016, data_2016),
        ],
        spec,
    )
}

#[test]
fn renamed_variable_gets_one_factor_across_years() {
    let (inputs, spec) = grade_years();
    let output = harmonize(inputs, &spec, None).expect("harmonize");
    let frame = &output.table.frame;

    let names: Vec<&str> = frame
        .get_column_names()
        .iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec!["year", "hhid", "fipsst", "education_level", "state"]);

    assert_eq!(
        output.table.schema.levels("education_level"),
        Some(&["Low".to_string(), "Mid".to_string(), "High".to_string()][..])
    );
    assert_eq!(
        strings(frame, "education_level"),
        vec![
            Some("Low".to_string()),
            Some("High".to_string()),
            None,
            Some("Low".to_string()),
            Some("Mid".to_string()),
            Some("High".to_string()),
        ]
    );
    let years: Vec<Option<i32>> = frame.column("year").unwrap().i32().unwrap().iter().collect();
    assert_eq!(years, vec![Some(2016), Some(2016), Some(2016), Some(2017), Some(2017), Some(2017)]);
    assert_eq!(
        strings(frame, "state"),
        vec![
            Some("California".to_string()),
            Some("New York".to_string()),
            Some("California".to_string()),
            Some("California".to_string()),
            Some("Texas".to_string()),
            Some("Alabama".to_string()),
        ]
    );

    assert_eq!(output.years.len(), 2);
    assert_eq!(output.years[0].year, 2016);
    assert_eq!(output.years[0].categorical, 1);
    assert_eq!(output.years[0].numeric, 2);
}

#[test]
fn codebook_lists_levels_in_order() {
    let (inputs, spec) = grade_years();
    let output = harmonize(inputs, &spec, None).expect("harmonize");
    let json = serde_json::to_string_pretty(&output.table.schema).unwrap();
    insta::assert_snapshot!(json, @r#"
    {
      "variables": [
        {
          "name": "hhid",
          "kind": "numeric",
          "years": [
            2016,
            2017
          ]
        },
        {
          "name": "fipsst",
          "kind": "numeric",
          "years": [
            2016,
            2017
          ]
        },
        {
          "name": "education_level",
          "description": "Highest grade completed",
          "kind": "factor",
          "levels": [
            "Low",
            "Mid",
            "High"
          ],
          "years": [
            2016,
            2017
          ]
        }
      ]
    }
    "#);
}

#[test]
fn classification_drift_is_fatal_unless_allow_listed() {
    let mut labels_2016 = LabelSet::new(2016);
    labels_2016.insert_group(value_labels("k2q01", &[(1, "Yes"), (2, "No")]));
    let data_2016 = table(2016, &[("hhid", &[1.0, 2.0]), ("k2q01", &[1.0, 2.0])]);
    // 2017 lost its declarations; the column arrives as plain numbers.
    let labels_2017 = LabelSet::new(2017);
    let data_2017 = table(
        2017,
        &[("hhid", &[3.0, 4.0, 5.0]), ("k2q01", &[2.0, 996.0, 7.0])],
    );
    let inputs = || {
        vec![
            YearInput::new(labels_2016.clone(), data_2016.clone()),
            YearInput::new(labels_2017.clone(), data_2017.clone()),
        ]
    };

    let strict = spec(r#"{"desired_variables": ["hhid", "k2q01"]}"#);
    let err = harmonize(inputs(), &strict, None).unwrap_err();
    match err {
        HarmonizeError::SchemaMismatch(SchemaMismatchError::ClassificationDrift {
            variable,
            categorical_years,
            numeric_years,
        }) => {
            assert_eq!(variable, "k2q01");
            assert_eq!(categorical_years, vec![2016]);
            assert_eq!(numeric_years, vec![2017]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let lenient = spec(
        r#"{"desired_variables": ["hhid", "k2q01"], "numeric_fallback": {"k2q01": [2017]}}"#,
    );
    let output = harmonize(inputs(), &lenient, None).expect("allow-listed drift");
    assert_eq!(
        strings(&output.table.frame, "k2q01"),
        vec![Some("Yes".to_string()), Some("No".to_string()), Some("No".to_string()), None, None]
    );
    let fallback: Vec<_> = output
        .audit
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::NumericFallback)
        .collect();
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].year, Some(2017));
    assert_eq!(fallback[0].count, 1);
}

#[test]
fn near_duplicate_levels_are_fatal() {
    let mut labels_2016 = LabelSet::new(2016);
    labels_2016.insert_group(value_labels("family", &[(1, "Two-parent household")]));
    let mut labels_2017 = LabelSet::new(2017);
    labels_2017.insert_group(value_labels("family", &[(1, "Two parent household")]));
    let inputs = vec![
        YearInput::new(labels_2016, table(2016, &[("family", &[1.0])])),
        YearInput::new(labels_2017, table(2017, &[("family", &[1.0])])),
    ];

    let err = harmonize(inputs, &spec(r#"{"desired_variables": ["family"]}"#), None).unwrap_err();
    assert!(matches!(
        err,
        HarmonizeError::SchemaMismatch(SchemaMismatchError::NearDuplicateLevels { .. })
    ));
}

#[test]
fn level_collapse_resolves_partial_vocabulary() {
    let mut labels_2016 = LabelSet::new(2016);
    labels_2016.insert_group(value_labels("family", &[(1, "Two parents"), (2, "Single parent")]));
    let mut labels_2018 = LabelSet::new(2018);
    labels_2018.insert_group(value_labels(
        "family",
        &[(1, "Two parents"), (2, "Single parent"), (3, "Grandparent household")],
    ));
    let inputs = vec![
        YearInput::new(labels_2016, table(2016, &[("family", &[1.0, 2.0])])),
        YearInput::new(labels_2018, table(2018, &[("family", &[1.0, 3.0])])),
    ];
    let spec = spec(
        r#"{"desired_variables": ["family"],
            "level_collapses": {"family": {"Grandparent household": "Single parent"}}}"#,
    );

    let output = harmonize(inputs, &spec, None).expect("harmonize");
    assert_eq!(
        output.table.schema.levels("family"),
        Some(&["Two parents".to_string(), "Single parent".to_string()][..])
    );
    assert_eq!(
        strings(&output.table.frame, "family"),
        vec![
            Some("Two parents".to_string()),
            Some("Single parent".to_string()),
            Some("Two parents".to_string()),
            Some("Single parent".to_string()),
        ]
    );
}

#[test]
fn disjoint_vocabulary_is_fatal() {
    let mut labels_2016 = LabelSet::new(2016);
    labels_2016.insert_group(value_labels("k7q30", &[(1, "Yes"), (2, "No")]));
    let mut labels_2017 = LabelSet::new(2017);
    labels_2017.insert_group(value_labels("k7q30", &[(1, "Agree"), (2, "Disagree")]));
    let inputs = vec![
        YearInput::new(labels_2016, table(2016, &[("k7q30", &[1.0, 2.0])])),
        YearInput::new(labels_2017, table(2017, &[("k7q30", &[1.0, 2.0])])),
    ];

    let err = harmonize(inputs, &spec(r#"{"desired_variables": ["k7q30"]}"#), None).unwrap_err();
    assert!(matches!(
        err,
        HarmonizeError::SchemaMismatch(SchemaMismatchError::DisjointVocabulary { year: 2016, .. })
    ));
}

fn households(count: usize) -> DataFrame {
    let ids: Vec<f64> = (1..=count).map(|i| i as f64).collect();
    DataFrame::new(vec![Series::new("hhid".into(), ids).into()]).unwrap()
}

#[test]
fn duplicate_side_table_keys_fail_before_joining() {
    let mut keys: Vec<i64> = (1..=100).collect();
    keys.push(7);
    let poverty: Vec<i64> = keys.iter().map(|k| k % 4).collect();
    let side = DataFrame::new(vec![
        Series::new("hhid".into(), keys).into(),
        Series::new("povlev".into(), poverty).into(),
    ])
    .unwrap();

    let err = join_side_table(households(100), &side, "hhid").unwrap_err();
    match err {
        HarmonizeError::JoinCardinality(JoinCardinalityError {
            key,
            duplicate_keys,
            examples,
        }) => {
            assert_eq!(key, "hhid");
            assert_eq!(duplicate_keys, 1);
            assert_eq!(examples, vec!["7".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unmatched_households_are_dropped_and_reported() {
    let keys: Vec<i64> = (1..=90).rev().collect();
    let poverty: Vec<i64> = keys.iter().map(|k| k * 10).collect();
    let side = DataFrame::new(vec![
        Series::new("hhid".into(), keys).into(),
        Series::new("povlev".into(), poverty).into(),
    ])
    .unwrap();

    let (joined, warning) = join_side_table(households(100), &side, "hhid").expect("join");
    assert_eq!(joined.height(), 90);
    let names: Vec<&str> = joined
        .get_column_names()
        .iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec!["hhid", "povlev"]);
    let ids = joined.column("hhid").unwrap().i64().unwrap();
    assert_eq!(ids.get(0), Some(1));
    assert_eq!(ids.get(89), Some(90));
    assert_eq!(joined.column("povlev").unwrap().i64().unwrap().get(0), Some(10));

    let warning = warning.expect("dropped rows reported");
    assert_eq!(warning.kind, WarningKind::JoinDropped);
    assert_eq!(warning.count, 10);
}

#[test]
fn the_same_year_twice_is_rejected() {
    let (mut inputs, spec) = grade_years();
    inputs.push(inputs[0].clone());
    let err = harmonize(inputs, &spec, None).unwrap_err();
    assert!(
        matches!(&err, HarmonizeError::Config { message } if message.contains("2016")),
        "{err}"
    );
}

fn side_table(keys: Series) -> DataFrame {
    let poverty: Vec<i64> = (1..=keys.len() as i64).map(|k| k * 100).collect();
    DataFrame::new(vec![keys.into(), Series::new("povlev".into(), poverty).into()]).unwrap()
}

#[test]
fn fractional_side_keys_are_rejected() {
    let side = side_table(Series::new("hhid".into(), vec![7.0, 7.4]));
    let err = join_side_table(households(10), &side, "hhid").unwrap_err();
    match err {
        HarmonizeError::InvalidKey { key, table, value } => {
            assert_eq!(key, "hhid");
            assert_eq!(table, "side table");
            assert_eq!(value, "7.4");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fractional_household_keys_are_rejected() {
    let frame = DataFrame::new(vec![Series::new("hhid".into(), vec![7.5, 7.0]).into()]).unwrap();
    let side = side_table(Series::new("hhid".into(), vec![7_i64]));
    let err = join_side_table(frame, &side, "hhid").unwrap_err();
    assert!(
        matches!(err, HarmonizeError::InvalidKey { table: "canonical table", .. }),
        "{err}"
    );
}

#[test]
fn text_keys_join_as_text() {
    let frame = DataFrame::new(vec![
        Series::new("hhid".into(), vec!["H1", "H2", "H3"]).into(),
        Series::new("grade".into(), vec!["Low", "High", "Low"]).into(),
    ])
    .unwrap();
    let side = side_table(Series::new("hhid".into(), vec!["H2", " H1 "]));

    let (joined, warning) = join_side_table(frame, &side, "hhid").expect("join");
    assert_eq!(
        strings(&joined, "hhid"),
        vec![Some("H1".to_string()), Some("H2".to_string())]
    );
    assert_eq!(
        joined.column("povlev").unwrap().i64().unwrap().get(0),
        Some(200)
    );
    assert_eq!(warning.expect("H3 dropped").count, 1);
}

#[test]
fn numeric_and_text_keys_agree() {
    let side = side_table(Series::new("hhid".into(), vec!["3", "1.0", " 2 "]));
    let (joined, warning) = join_side_table(households(3), &side, "hhid").expect("join");
    assert!(warning.is_none());
    let ids = joined.column("hhid").unwrap().i64().unwrap();
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![Some(1), Some(2), Some(3)]);
    let poverty = joined.column("povlev").unwrap().i64().unwrap();
    assert_eq!(
        poverty.into_iter().collect::<Vec<_>>(),
        vec![Some(200), Some(300), Some(100)]
    );

    let side = side_table(Series::new("hhid".into(), vec!["2", "2.0"]));
    let err = join_side_table(households(3), &side, "hhid").unwrap_err();
    assert!(matches!(
        err,
        HarmonizeError::JoinCardinality(JoinCardinalityError { duplicate_keys: 1, .. })
    ));
}

#[test]
fn writes_all_artifacts() {
    let (inputs, spec) = grade_years();
    let mut output = harmonize(inputs, &spec, None).expect("harmonize");
    let dir = tempfile::tempdir().unwrap();

    let csv_path = dir.path().join("out/nsch_harmonized.csv");
    write_canonical_csv(&mut output.table.frame, &csv_path).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(
        text.lines().next(),
        Some("year,hhid,fipsst,education_level,state")
    );
    assert_eq!(text.lines().count(), 7);

    let codebook_path = dir.path().join("codebook.json");
    write_codebook(&output.table.schema, &codebook_path).unwrap();
    let codebook: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&codebook_path).unwrap()).unwrap();
    assert_eq!(codebook["variables"][2]["kind"], "factor");

    let audit_path = dir.path().join("audit.json");
    write_audit_report(&output.audit, &audit_path).unwrap();
    let audit: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&audit_path).unwrap()).unwrap();
    assert!(audit["warnings"].is_array());
}
