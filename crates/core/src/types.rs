//! Identifier and time types shared across the workspace.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Calendar events are addressed by UUID (v4, assigned at creation).
pub type EventId = uuid::Uuid;

/// Campaign series identifier.
pub type SeriesId = uuid::Uuid;

/// Change request identifier.
pub type RequestId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A calendar scope: one client's view of one month.
///
/// Serialized as separate `year`/`month` fields; displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Construct a validated scope. Month must be 1-12; year must be
    /// four digits (the approval key format encodes exactly four).
    pub fn new(year: i32, month: u32) -> Result<Self, CoreError> {
        if !(1..=12).contains(&month) {
            return Err(CoreError::Validation(format!(
                "month must be 1-12, got {month}"
            )));
        }
        if !(1000..=9999).contains(&year) {
            return Err(CoreError::Validation(format!(
                "year must be four digits, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Whether the given instant falls inside this month (UTC).
    pub fn contains(&self, at: Timestamp) -> bool {
        at.year() == self.year && at.month() == self.month
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_valid_year_months() {
        assert!(YearMonth::new(2025, 1).is_ok());
        assert!(YearMonth::new(2025, 12).is_ok());
    }

    #[test]
    fn test_month_out_of_range() {
        assert!(YearMonth::new(2025, 0).is_err());
        assert!(YearMonth::new(2025, 13).is_err());
    }

    #[test]
    fn test_year_out_of_range() {
        assert!(YearMonth::new(25, 6).is_err());
        assert!(YearMonth::new(12345, 6).is_err());
    }

    #[test]
    fn test_display_zero_pads_month() {
        let ym = YearMonth::new(2025, 3).unwrap();
        assert_eq!(ym.to_string(), "2025-03");
    }

    #[test]
    fn test_contains() {
        let ym = YearMonth::new(2025, 12).unwrap();
        let inside = Utc.with_ymd_and_hms(2025, 12, 15, 10, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(ym.contains(inside));
        assert!(!ym.contains(outside));
    }
}
