//! Tests for the label-definition parser.

use nsch_ingest::parse_label_definitions;
use nsch_model::{LabelCode, Sentinel, VariableClass};
use proptest::prelude::*;

const SCRIPT: &str = r#"
* NSCH 2018 topical value labels
label define sc_sex_lab 1 "Male"
label define sc_sex_lab 2 "Female", add
label define sc_sex_lab .m "No valid response", add

label define K2Q01_lab 1 "Excellent"
label define K2Q01_lab 2 "Very good", add
label define K2Q01_lab 3 "Don’t know", add
label define K2Q01_lab .l "Logical skip", add

label define bmiclass_lab .m "No valid response"
label define bmiclass_lab .n "Not in universe", add

label values sc_sex sc_sex_lab
label variable sc_sex "Sex of selected child"
label variable sc_age_years "Age of selected child"
"#;

#[test]
fn classifies_categorical_and_pass_through() {
    let set = parse_label_definitions(SCRIPT, 2018).expect("parse script");

    assert_eq!(set.year, 2018);
    assert_eq!(set.classify("sc_sex"), VariableClass::Categorical);
    assert_eq!(set.classify("k2q01"), VariableClass::Categorical);
    assert_eq!(set.classify("bmiclass"), VariableClass::PassThrough);
    // Only described, never declared.
    assert_eq!(set.classify("sc_age_years"), VariableClass::PassThrough);

    assert!(set.value_labels("bmiclass").is_none());
    assert_eq!(set.pass_through().collect::<Vec<_>>(), vec!["bmiclass"]);
    assert_eq!(
        set.variable_description("sc_sex"),
        Some("Sex of selected child")
    );
}

#[test]
fn keeps_declaration_order_and_sentinels() {
    let set = parse_label_definitions(SCRIPT, 2018).expect("parse script");
    let k2q01 = set.value_labels("k2q01").expect("k2q01 labels");

    let codes: Vec<LabelCode> = k2q01.definitions().iter().map(|d| d.code).collect();
    assert_eq!(
        codes,
        vec![
            LabelCode::Value(1),
            LabelCode::Value(2),
            LabelCode::Value(3),
            LabelCode::Sentinel(Sentinel::LogicalSkip),
        ]
    );
    assert_eq!(k2q01.description_for(3), Some("Don't know"));
    assert_eq!(k2q01.description_for(998), Some("Logical skip"));
}

#[test]
fn rejects_malformed_define_with_offset() {
    let text = "label define a_lab 1 \"One\"\nlabel define a_lab two \"Two\"\n";
    let err = parse_label_definitions(text, 2016).unwrap_err();
    assert_eq!(err.year, 2016);
    assert_eq!(err.offset, 27);
    assert!(err.line.contains("two"));
}

#[test]
fn rejects_unterminated_quote() {
    let text = "label define a_lab 1 \"One\n";
    let err = parse_label_definitions(text, 2016).unwrap_err();
    assert_eq!(err.offset, 0);
    assert_eq!(err.reason, "unterminated quote");
}

#[test]
fn rejects_duplicate_code() {
    let text = "label define a_lab 1 \"One\"\nlabel define a_lab 1 \"Uno\", add\n";
    let err = parse_label_definitions(text, 2016).unwrap_err();
    assert!(err.reason.contains("declared twice"), "{}", err.reason);
}

#[test]
fn rejects_unknown_missing_token() {
    let text = "label define a_lab .z \"Zed\"\n";
    let err = parse_label_definitions(text, 2016).unwrap_err();
    assert!(err.reason.contains(".z"));
}

#[test]
fn rejects_text_without_declarations() {
    let err = parse_label_definitions("id,value\n1,2\n", 2020).unwrap_err();
    assert_eq!(err.offset, 0);
    assert_eq!(err.line, "id,value");
}

#[test]
fn empty_text_is_an_empty_set() {
    let set = parse_label_definitions("\n\n", 2020).expect("empty parses");
    assert!(set.variables().is_empty());
}

#[test]
fn missing_first_line_is_tolerated() {
    // The first real-value line was lost upstream; the sentinel-only
    // remainder is indistinguishable from a pass-through variable.
    let text = "label define k6q40_lab .m \"No valid response\"\n";
    let set = parse_label_definitions(text, 2017).expect("parse");
    assert_eq!(set.classify("k6q40"), VariableClass::PassThrough);
}

proptest! {
    #[test]
    fn code_description_round_trip(
        entries in proptest::collection::btree_map(-5i64..995, "[A-Za-z][A-Za-z ]{0,20}", 1..12)
    ) {
        let mut text = String::new();
        for (code, description) in &entries {
            text.push_str(&format!("label define v_lab {code} \"{description}\", add\n"));
        }
        let set = parse_label_definitions(&text, 2021).expect("generated script parses");
        let labels = set.value_labels("v").expect("categorical");
        for &code in entries.keys() {
            let description = labels.description_for(code).expect("declared code");
            let first = entries
                .iter()
                .find(|(_, d)| d.trim() == description)
                .map(|(c, _)| *c)
                .expect("description present");
            prop_assert_eq!(labels.code_for(description), Some(LabelCode::Value(first)));
        }
    }
}
