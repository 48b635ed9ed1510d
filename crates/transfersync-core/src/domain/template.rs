//! Date-tag resolution for remote path templates
//!
//! Recognised tags, each replaced by the zero-padded UTC calendar value of
//! the reference instant:
//!
//! | tag       | example |
//! |-----------|---------|
//! | `%year%`  | `2024`  |
//! | `%month%` | `03`    |
//! | `%day%`   | `05`    |
//!
//! Any other `%...%` sequence is left untouched.

use chrono::{DateTime, Datelike, Utc};

/// Tag replaced by the four-digit year
pub const YEAR_TAG: &str = "%year%";
/// Tag replaced by the two-digit month
pub const MONTH_TAG: &str = "%month%";
/// Tag replaced by the two-digit day of month
pub const DAY_TAG: &str = "%day%";

/// Resolves every date tag in `template` against `reference`
///
/// Pure and deterministic: the same template and instant always produce the
/// same output, and a template without tags is returned unchanged.
pub fn resolve(template: &str, reference: DateTime<Utc>) -> String {
    if !template.contains('%') {
        return template.to_string();
    }
    template
        .replace(YEAR_TAG, &format!("{:04}", reference.year()))
        .replace(MONTH_TAG, &format!("{:02}", reference.month()))
        .replace(DAY_TAG, &format!("{:02}", reference.day()))
}

/// Returns true if `template` contains at least one recognised date tag
pub fn has_date_tags(template: &str) -> bool {
    [YEAR_TAG, MONTH_TAG, DAY_TAG]
        .iter()
        .any(|tag| template.contains(tag))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_resolve_without_tags_is_identity() {
        let template = "/outbound/reports";
        assert_eq!(resolve(template, at(2024, 3, 5, 0)), template);
    }

    #[test]
    fn test_resolve_all_tags_zero_padded() {
        assert_eq!(
            resolve("%year%-%month%-%day%", at(2024, 3, 5, 0)),
            "2024-03-05"
        );
    }

    #[test]
    fn test_resolve_replaces_every_occurrence() {
        assert_eq!(
            resolve("/%year%/%month%/%year%%month%%day%", at(2023, 12, 31, 23)),
            "/2023/12/20231231"
        );
    }

    #[test]
    fn test_resolve_leaves_unknown_tags() {
        assert_eq!(
            resolve("/in/%hour%/%year%/%", at(2024, 1, 2, 0)),
            "/in/%hour%/2024/%"
        );
    }

    #[test]
    fn test_resolve_uses_utc_calendar() {
        let late = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(resolve("%month%%day%", late), "0229");
    }

    #[test]
    fn test_has_date_tags() {
        assert!(has_date_tags("/out/%day%"));
        assert!(!has_date_tags("/out/%hour%"));
    }
}
