use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day of a TVL series from an external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvlObservation {
    pub day: NaiveDate,
    pub tvl_usd: Decimal,
}

impl TvlObservation {
    pub fn new(day: NaiveDate, tvl_usd: Decimal) -> Self {
        Self { day, tvl_usd }
    }
}

/// Computed vs. reference TVL for a single day.
///
/// Either side may be missing: the join is an outer join on `day`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub day: NaiveDate,

    /// TVL from the event ledger, if the ledger has a snapshot for this day
    pub computed: Option<Decimal>,

    /// TVL from the reference series, if it has an observation for this day
    pub reference: Option<Decimal>,

    /// computed - reference, only when both sides are present
    pub difference: Option<Decimal>,
}

/// Result of validating the computed TVL series against a reference series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Rows in ascending day order
    pub rows: Vec<ReconciliationRow>,

    /// Days with a computed value
    pub computed_count: usize,

    /// Days with a reference value
    pub reference_count: usize,

    /// Days with both values
    pub overlap_count: usize,

    /// Pearson correlation over overlapping days.
    /// `None` with fewer than two overlapping days or a constant series.
    pub correlation: Option<f64>,
}

impl ReconciliationReport {
    /// Largest absolute difference over overlapping days.
    #[must_use]
    pub fn max_abs_difference(&self) -> Option<Decimal> {
        self.rows
            .iter()
            .filter_map(|r| r.difference.map(|d| d.abs()))
            .max()
    }

    #[must_use]
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.day)
    }

    #[must_use]
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.day)
    }
}
