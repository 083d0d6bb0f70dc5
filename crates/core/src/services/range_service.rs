use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::snapshot::DailySnapshot;

/// Maximum query range in days (10 years).
pub const MAX_RANGE_DAYS: i64 = 3650;

/// Check that `from..=to` is a usable query window.
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), CoreError> {
    if from > to {
        return Err(CoreError::ValidationError(format!(
            "'from' date ({from}) must not be after 'to' date ({to})"
        )));
    }
    let range_days = (to - from).num_days();
    if range_days > MAX_RANGE_DAYS {
        return Err(CoreError::ValidationError(format!(
            "Range of {range_days} days exceeds maximum of {MAX_RANGE_DAYS} days (10 years)"
        )));
    }
    Ok(())
}

/// Snapshots whose day falls in `from..=to`.
///
/// Input must be day-ordered (as produced by the aggregator); the window is
/// located with binary search.
pub fn filter_range(
    snapshots: &[DailySnapshot],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<&[DailySnapshot], CoreError> {
    validate_range(from, to)?;
    let start = snapshots.partition_point(|s| s.day < from);
    let end = snapshots.partition_point(|s| s.day <= to);
    Ok(&snapshots[start..end.max(start)])
}

/// Snapshot in effect on `day`: the last recorded day at or before it.
#[must_use]
pub fn snapshot_as_of(snapshots: &[DailySnapshot], day: NaiveDate) -> Option<&DailySnapshot> {
    let idx = snapshots.partition_point(|s| s.day <= day);
    idx.checked_sub(1).map(|i| &snapshots[i])
}
