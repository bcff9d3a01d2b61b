//! Label-definition parser.
//!
//! Each survey year ships a Stata script declaring value labels, one code per
//! line:
//!
//! ```text
//! label define sc_sex_lab 1 "Male"
//! label define sc_sex_lab 2 "Female", add
//! label define sc_sex_lab .m "No valid response", add
//! label variable sc_sex "Sex of selected child"
//! ```
//!
//! Declarations are grouped by variable (the `_lab` suffix is stripped and the
//! name lowercased) and each group is classified once when it is filed into the
//! year's [`LabelSet`]. Lines that are not label statements are ignored; a
//! `label define` line that does not fit the grammar rejects the whole file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use nsch_model::{LabelCode, LabelSet, ParseError, ValueLabels, normalize_apostrophes};

use crate::error::{IngestError, Result};

static DEFINE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*label\s+define\b").expect("Invalid define prefix regex"));

static DEFINE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*label\s+define\s+(?P<variable>[a-z_][a-z0-9_]*)_lab\s+(?P<code>-?\d+|\.[a-z])\s+"(?P<description>[^"]*)"\s*(?:,\s*(?:add|modify|replace)\s*)*;?\s*$"#,
    )
    .expect("Invalid label define regex")
});

static VARIABLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*label\s+var(?:iable)?\s+(?P<variable>[a-z_][a-z0-9_]*)\s+"(?P<description>[^"]*)"\s*;?\s*$"#,
    )
    .expect("Invalid label variable regex")
});

/// Parses one year's label-definition script.
///
/// Nothing is returned on failure; a malformed declaration anywhere rejects
/// the year.
pub fn parse_label_definitions(text: &str, year: u16) -> std::result::Result<LabelSet, ParseError> {
    let mut groups: Vec<ValueLabels> = Vec::new();
    let mut group_index: BTreeMap<String, usize> = BTreeMap::new();
    let mut set = LabelSet::new(year);
    let mut statements = 0usize;
    let mut first_content: Option<(usize, &str)> = None;

    let mut offset = 0usize;
    for raw_line in text.split_inclusive('\n') {
        let line_offset = offset;
        offset += raw_line.len();
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        first_content.get_or_insert((line_offset, line));

        let error = |reason: String| ParseError {
            year,
            offset: line_offset,
            line: line.to_string(),
            reason,
        };

        if DEFINE_PREFIX.is_match(line) {
            if line.matches('"').count() % 2 == 1 {
                return Err(error("unterminated quote".to_string()));
            }
            let Some(caps) = DEFINE_LINE.captures(line) else {
                return Err(error(
                    "expected `label define <var>_lab <code> \"<description>\"`".to_string(),
                ));
            };
            let variable = caps["variable"].to_lowercase();
            let raw_code = &caps["code"];
            let Some(code) = LabelCode::parse(raw_code) else {
                let reason = if raw_code.starts_with('.') {
                    format!("unknown missing-value token `{raw_code}`")
                } else {
                    format!("code `{raw_code}` is out of range")
                };
                return Err(error(reason));
            };
            let description = normalize_apostrophes(caps["description"].trim());

            let idx = *group_index.entry(variable.clone()).or_insert_with(|| {
                groups.push(ValueLabels::new(variable.clone()));
                groups.len() - 1
            });
            if let Err(code) = groups[idx].insert(code, description) {
                return Err(error(format!("code {code} declared twice for `{variable}`")));
            }
            statements += 1;
        } else if let Some(caps) = VARIABLE_LINE.captures(line) {
            let description = normalize_apostrophes(caps["description"].trim());
            set.set_variable_description(caps["variable"].to_lowercase(), description);
            statements += 1;
        }
    }

    if statements == 0
        && let Some((offset, line)) = first_content
    {
        return Err(ParseError {
            year,
            offset,
            line: line.to_string(),
            reason: "no label declarations found".to_string(),
        });
    }

    for group in groups {
        set.insert_group(group);
    }

    debug!(
        year,
        categorical = set.categorical().count(),
        pass_through = set.pass_through().count(),
        "parsed label definitions"
    );
    Ok(set)
}

/// Reads and parses a label-definition file.
pub fn read_label_definitions(path: &Path, year: u16) -> Result<LabelSet> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_label_definitions(&text, year).map_err(|source| {
        warn!(year, path = %path.display(), offset = source.offset, "label definitions rejected");
        IngestError::Labels {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsch_model::{Sentinel, VariableClass};

    #[test]
    fn define_regex_strips_lab_suffix() {
        let caps = DEFINE_LINE
            .captures(r#"label define k2q01_lab_lab 3 "Good""#)
            .expect("line matches");
        assert_eq!(&caps["variable"], "k2q01_lab");
        assert_eq!(&caps["code"], "3");
        assert_eq!(&caps["description"], "Good");
    }

    #[test]
    fn define_regex_accepts_options_and_semicolons() {
        assert!(DEFINE_LINE.is_match(r#"label define a_lab 1 "x", add"#));
        assert!(DEFINE_LINE.is_match(r#"label define a_lab 1 "x", modify;"#));
        assert!(DEFINE_LINE.is_match(r#"  LABEL DEFINE A_LAB .m "x""#));
        assert!(!DEFINE_LINE.is_match(r#"label define a 1 "x""#));
    }

    #[test]
    fn crlf_offsets_are_byte_accurate() {
        let text = "label define a_lab 1 \"x\"\r\nlabel define a_lab y \"z\"\r\n";
        let err = parse_label_definitions(text, 2020).unwrap_err();
        assert_eq!(err.offset, 26);
        assert_eq!(err.line, "label define a_lab y \"z\"");
    }

    #[test]
    fn sentinel_tokens_and_numbers_are_one_code() {
        let text = "label define a_lab 1 \"x\"\nlabel define a_lab .m \"No valid response\"\n";
        let set = parse_label_definitions(text, 2020).unwrap();
        let labels = set.value_labels("a").unwrap();
        assert_eq!(
            labels.description_for(Sentinel::NoValidResponse.code()),
            Some("No valid response")
        );
        assert_eq!(set.classify("a"), VariableClass::Categorical);
    }
}
