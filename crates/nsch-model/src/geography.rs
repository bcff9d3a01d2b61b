//! FIPS state codes used by the survey's state identifier.

const STATE_NAMES: &[(u8, &str)] = &[
    (1, "Alabama"),
    (2, "Alaska"),
    (4, "Arizona"),
    (5, "Arkansas"),
    (6, "California"),
    (8, "Colorado"),
    (9, "Connecticut"),
    (10, "Delaware"),
    (11, "District of Columbia"),
    (12, "Florida"),
    (13, "Georgia"),
    (15, "Hawaii"),
    (16, "Idaho"),
    (17, "Illinois"),
    (18, "Indiana"),
    (19, "Iowa"),
    (20, "Kansas"),
    (21, "Kentucky"),
    (22, "Louisiana"),
    (23, "Maine"),
    (24, "Maryland"),
    (25, "Massachusetts"),
    (26, "Michigan"),
    (27, "Minnesota"),
    (28, "Mississippi"),
    (29, "Missouri"),
    (30, "Montana"),
    (31, "Nebraska"),
    (32, "Nevada"),
    (33, "New Hampshire"),
    (34, "New Jersey"),
    (35, "New Mexico"),
    (36, "New York"),
    (37, "North Carolina"),
    (38, "North Dakota"),
    (39, "Ohio"),
    (40, "Oklahoma"),
    (41, "Oregon"),
    (42, "Pennsylvania"),
    (44, "Rhode Island"),
    (45, "South Carolina"),
    (46, "South Dakota"),
    (47, "Tennessee"),
    (48, "Texas"),
    (49, "Utah"),
    (50, "Vermont"),
    (51, "Virginia"),
    (53, "Washington"),
    (54, "West Virginia"),
    (55, "Wisconsin"),
    (56, "Wyoming"),
];

/// State name for a numeric FIPS code.
pub fn state_name(code: f64) -> Option<&'static str> {
    if code.fract() != 0.0 || !(0.0..=255.0).contains(&code) {
        return None;
    }
    let code = code as u8;
    STATE_NAMES
        .binary_search_by_key(&code, |(c, _)| *c)
        .ok()
        .map(|idx| STATE_NAMES[idx].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_complete() {
        assert!(STATE_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(STATE_NAMES.len(), 51);
    }

    #[test]
    fn looks_up_codes() {
        assert_eq!(state_name(6.0), Some("California"));
        assert_eq!(state_name(11.0), Some("District of Columbia"));
        assert_eq!(state_name(3.0), None);
        assert_eq!(state_name(6.5), None);
        assert_eq!(state_name(999.0), None);
    }
}
