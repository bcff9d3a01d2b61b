//! Explicit outcomes for lookups that used to fall back silently.

/// Result of resolving something against the current year's data.
///
/// Callers log and record the non-`Found` branches; tests assert on them.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult<T> {
    /// Resolved.
    Found(T),
    /// Present but without a usable mapping (e.g. an undocumented code).
    Unmapped,
    /// The target does not exist for this year; nothing to do.
    NotApplicable,
}

impl<T> LookupResult<T> {
    pub fn found(self) -> Option<T> {
        match self {
            LookupResult::Found(value) => Some(value),
            LookupResult::Unmapped | LookupResult::NotApplicable => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LookupResult<U> {
        match self {
            LookupResult::Found(value) => LookupResult::Found(f(value)),
            LookupResult::Unmapped => LookupResult::Unmapped,
            LookupResult::NotApplicable => LookupResult::NotApplicable,
        }
    }
}
