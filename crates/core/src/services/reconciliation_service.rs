use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::reconciliation::{ReconciliationReport, ReconciliationRow, TvlObservation};
use crate::models::snapshot::DailySnapshot;

/// Validates the computed TVL series against an externally sourced one.
///
/// The reference series is expected to hold at most one value per day;
/// callers that read raw exports should collapse duplicates first
/// (see `storage::csv_io::read_tvl_series`). If duplicates still arrive, the
/// last one for a day wins.
pub struct ReconciliationService;

impl ReconciliationService {
    pub fn new() -> Self {
        Self
    }

    /// Outer-join both series on day and compute coverage, differences and correlation.
    pub fn reconcile(
        &self,
        snapshots: &[DailySnapshot],
        reference: &[TvlObservation],
    ) -> ReconciliationReport {
        let mut joined: BTreeMap<NaiveDate, (Option<Decimal>, Option<Decimal>)> = BTreeMap::new();

        for snapshot in snapshots {
            joined.entry(snapshot.day).or_default().0 = Some(snapshot.tvl_amount_usd);
        }
        for observation in reference {
            let slot = joined.entry(observation.day).or_default();
            if slot.1.is_some() {
                warn!(day = %observation.day, "duplicate reference TVL observation, keeping the last one");
            }
            slot.1 = Some(observation.tvl_usd);
        }

        let rows: Vec<ReconciliationRow> = joined
            .into_iter()
            .map(|(day, (computed, reference))| ReconciliationRow {
                day,
                computed,
                reference,
                difference: match (computed, reference) {
                    (Some(c), Some(r)) => c.checked_sub(r),
                    _ => None,
                },
            })
            .collect();

        let computed_count = rows.iter().filter(|r| r.computed.is_some()).count();
        let reference_count = rows.iter().filter(|r| r.reference.is_some()).count();

        let pairs: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|r| match (r.computed, r.reference) {
                (Some(c), Some(r)) => Some((c.to_f64()?, r.to_f64()?)),
                _ => None,
            })
            .collect();
        let overlap_count = rows
            .iter()
            .filter(|r| r.computed.is_some() && r.reference.is_some())
            .count();

        let correlation = if pairs.len() > 1 {
            pearson(&pairs)
        } else {
            None
        };

        debug!(
            computed_count,
            reference_count, overlap_count, ?correlation, "reconciled TVL series"
        );

        ReconciliationReport {
            rows,
            computed_count,
            reference_count,
            overlap_count,
            correlation,
        }
    }
}

impl Default for ReconciliationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Pearson correlation coefficient. `None` if either side has zero variance.
/// Variance is measured relative to each series' sum of squares.
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    let (mut sq_x, mut sq_y) = (0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
        sq_x += x * x;
        sq_y += y * y;
    }

    if var_x <= sq_x * f64::EPSILON || var_y <= sq_y * f64::EPSILON {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
