use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::totals::Totals;
use crate::errors::CoreError;

/// Pure TVL over supply, or `Undefined` when supply is zero.
///
/// Serialized as a decimal or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum Ratio {
    Defined(Decimal),
    Undefined,
}

impl Ratio {
    /// `numerator / denominator`, `Undefined` for a zero denominator.
    ///
    /// A quotient outside the decimal range is an `ArithmeticOverflow`.
    pub fn compute(numerator: Decimal, denominator: Decimal) -> Result<Self, CoreError> {
        if denominator.is_zero() {
            return Ok(Ratio::Undefined);
        }
        numerator
            .checked_div(denominator)
            .map(Ratio::Defined)
            .ok_or_else(|| {
                CoreError::ArithmeticOverflow(format!("ratio {numerator} / {denominator}"))
            })
    }

    #[must_use]
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Ratio::Defined(v) => Some(*v),
            Ratio::Undefined => None,
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Ratio::Undefined)
    }

    /// Round half away from zero to `dp` decimal places.
    #[must_use]
    pub fn rounded(self, dp: u32) -> Self {
        match self {
            Ratio::Defined(v) => {
                Ratio::Defined(v.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
            }
            Ratio::Undefined => Ratio::Undefined,
        }
    }
}

impl From<Option<Decimal>> for Ratio {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Ratio::Undefined, Ratio::Defined)
    }
}

impl From<Ratio> for Option<Decimal> {
    fn from(ratio: Ratio) -> Self {
        ratio.value()
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ratio::Defined(v) => write!(f, "{v}"),
            Ratio::Undefined => write!(f, "undefined"),
        }
    }
}

/// Cumulative vault metrics at the end of one day.
///
/// Derived data: always rebuilt from the event history, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub day: NaiveDate,

    /// Running supply through and including `day`
    pub supply_amount_usd: Decimal,

    /// Running borrow through and including `day`
    pub borrow_amount_usd: Decimal,

    /// Running collateral through and including `day`
    pub collateral_amount_usd: Decimal,

    /// supply + collateral
    pub tvl_amount_usd: Decimal,

    /// tvl - borrow
    pub pure_tvl_amount_usd: Decimal,

    /// pure_tvl / supply
    pub ratio: Ratio,
}

impl DailySnapshot {
    /// Derive the full snapshot from the running totals at the end of `day`.
    pub fn from_totals(day: NaiveDate, totals: &Totals) -> Result<Self, CoreError> {
        let tvl = totals
            .supply
            .checked_add(totals.collateral)
            .ok_or_else(|| CoreError::ArithmeticOverflow(format!("TVL on {day}")))?;
        let pure_tvl = tvl
            .checked_sub(totals.borrow)
            .ok_or_else(|| CoreError::ArithmeticOverflow(format!("pure TVL on {day}")))?;
        let ratio = Ratio::compute(pure_tvl, totals.supply)
            .map_err(|_| CoreError::ArithmeticOverflow(format!("ratio on {day}")))?;
        Ok(Self {
            day,
            supply_amount_usd: totals.supply,
            borrow_amount_usd: totals.borrow,
            collateral_amount_usd: totals.collateral,
            tvl_amount_usd: tvl,
            pure_tvl_amount_usd: pure_tvl,
            ratio,
        })
    }
}
