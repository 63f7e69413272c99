//! Multi-day campaign series: model and membership policy.
//!
//! A series groups `day_count` consecutive calendar events under one
//! [`SeriesId`]. Series are created, edited, and deleted as a unit; the
//! policy functions here decide when an individually edited member stays in
//! the series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EventId, SeriesId, Timestamp};

/// A series must span at least two days to be worth grouping.
pub const MIN_SERIES_DAYS: usize = 2;

/// A series never spans more than one calendar month.
pub const MAX_SERIES_DAYS: usize = 31;

/// Registry entry for one multi-day campaign series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSeries {
    pub id: SeriesId,
    /// Logical campaign name shared by all members.
    pub name: String,
    /// Member event ids in day order.
    pub member_ids: Vec<EventId>,
    /// Per-day labels, same length as `member_ids`.
    pub day_labels: Vec<String>,
    pub created_at: Timestamp,
}

/// Validate a requested series day count.
pub fn validate_day_count(day_count: usize) -> Result<(), CoreError> {
    if !(MIN_SERIES_DAYS..=MAX_SERIES_DAYS).contains(&day_count) {
        return Err(CoreError::Validation(format!(
            "series day count must be {MIN_SERIES_DAYS}-{MAX_SERIES_DAYS}, got {day_count}"
        )));
    }
    Ok(())
}

/// Whether a sorted set of dates forms one contiguous run of days.
pub fn is_contiguous(dates: &[NaiveDate]) -> bool {
    let mut sorted: Vec<NaiveDate> = dates.to_vec();
    sorted.sort_unstable();
    sorted
        .windows(2)
        .all(|pair| (pair[1] - pair[0]).num_days() == 1)
}

/// Membership policy for an individually edited member.
///
/// The member stays associated with its series as long as its new date lies
/// inside the series' contiguous day range; moving it outside detaches it.
/// Label or content edits never detach (callers only consult this for date
/// changes).
pub fn stays_in_series(member_dates: &[NaiveDate], new_date: NaiveDate) -> bool {
    let (Some(first), Some(last)) = (member_dates.iter().min(), member_dates.iter().max()) else {
        return false;
    };
    new_date >= *first && new_date <= *last
}
