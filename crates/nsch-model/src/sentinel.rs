//! Survey missing-data sentinels.
//!
//! The survey reserves four codes for missingness. They show up in three
//! spellings depending on where they were read from:
//!
//! | Sentinel          | Stata token | Numeric code | Description                    |
//! |-------------------|-------------|--------------|--------------------------------|
//! | `NoValidResponse` | `.m`        | 996          | No valid response              |
//! | `NotInUniverse`   | `.n`        | 997          | Not in universe                |
//! | `LogicalSkip`     | `.l`        | 998          | Logical skip                   |
//! | `Suppressed`      | `.d`        | 999          | Suppressed for confidentiality |

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four reserved missing-data codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sentinel {
    /// Respondent gave no usable answer.
    NoValidResponse,
    /// Question does not apply to this respondent.
    NotInUniverse,
    /// Question skipped by the instrument's branching logic.
    LogicalSkip,
    /// Value redacted for confidentiality.
    Suppressed,
}

impl Sentinel {
    pub const ALL: [Sentinel; 4] = [
        Sentinel::NoValidResponse,
        Sentinel::NotInUniverse,
        Sentinel::LogicalSkip,
        Sentinel::Suppressed,
    ];

    /// Numeric code used in the converted yearly tables.
    pub const fn code(self) -> i64 {
        match self {
            Sentinel::NoValidResponse => 996,
            Sentinel::NotInUniverse => 997,
            Sentinel::LogicalSkip => 998,
            Sentinel::Suppressed => 999,
        }
    }

    /// Stata extended-missing token.
    pub const fn token(self) -> &'static str {
        match self {
            Sentinel::NoValidResponse => ".m",
            Sentinel::NotInUniverse => ".n",
            Sentinel::LogicalSkip => ".l",
            Sentinel::Suppressed => ".d",
        }
    }

    /// Canonical description carried as a factor level until the null collapse.
    pub const fn description(self) -> &'static str {
        match self {
            Sentinel::NoValidResponse => "No valid response",
            Sentinel::NotInUniverse => "Not in universe",
            Sentinel::LogicalSkip => "Logical skip",
            Sentinel::Suppressed => "Suppressed for confidentiality",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Matches a raw cell value; only whole numbers can be sentinels.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.fract() != 0.0 {
            return None;
        }
        Self::from_code(value as i64)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.token().eq_ignore_ascii_case(token))
    }

    /// Case-insensitive match against the canonical descriptions.
    pub fn from_description(description: &str) -> Option<Self> {
        let description = description.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.description().eq_ignore_ascii_case(description))
    }

    pub fn is_sentinel_description(description: &str) -> bool {
        Self::from_description(description).is_some()
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Why a cell holds no usable value.
///
/// `Sentinel` keeps the reason so categorical columns can carry it as a level
/// through the transformation stage; `Absent` is an ordinary empty cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Missingness {
    Value(f64),
    Sentinel(Sentinel),
    Absent,
}

impl Missingness {
    pub fn classify(value: Option<f64>) -> Self {
        match value {
            None => Missingness::Absent,
            Some(v) => match Sentinel::from_value(v) {
                Some(sentinel) => Missingness::Sentinel(sentinel),
                None => Missingness::Value(v),
            },
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Missingness::Value(v) => Some(v),
            Missingness::Sentinel(_) | Missingness::Absent => None,
        }
    }
}
