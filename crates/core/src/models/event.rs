use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;

/// Kind of vault interaction.
///
/// The wire form is the variant name (`"SupplyCollateral"`). Parsing is
/// lenient about case and separators so that snake_case columns coming out
/// of SQL exports (`supply_collateral`) are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventKind {
    Supply,
    Withdraw,
    Borrow,
    Repay,
    SupplyCollateral,
    WithdrawCollateral,
    LiquidationBadDebt,
    LiquidationRepaid,
    LiquidationSeized,
    InterestSupply,
    InterestBorrow,
}

/// Which running total an event moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Supply,
    Borrow,
    Collateral,
}

/// Direction of an event's effect on its category total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    /// Adds to the total
    Credit,
    /// Subtracts from the total
    Debit,
}

/// The category/sign pair an event kind resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignPolicy {
    pub category: Category,
    pub sign: Sign,
}

const fn policy(category: Category, sign: Sign) -> SignPolicy {
    SignPolicy { category, sign }
}

/// Sign policy per kind, indexed by `EventKind::index()`.
static SIGN_POLICY: [SignPolicy; EventKind::COUNT] = [
    policy(Category::Supply, Sign::Credit),     // Supply
    policy(Category::Supply, Sign::Debit),      // Withdraw
    policy(Category::Borrow, Sign::Credit),     // Borrow
    policy(Category::Borrow, Sign::Debit),      // Repay
    policy(Category::Collateral, Sign::Credit), // SupplyCollateral
    policy(Category::Collateral, Sign::Debit),  // WithdrawCollateral
    policy(Category::Supply, Sign::Debit),      // LiquidationBadDebt
    policy(Category::Borrow, Sign::Debit),      // LiquidationRepaid
    policy(Category::Collateral, Sign::Debit),  // LiquidationSeized
    policy(Category::Supply, Sign::Credit),     // InterestSupply
    policy(Category::Borrow, Sign::Credit),     // InterestBorrow
];

impl EventKind {
    pub const COUNT: usize = 11;

    /// Every kind, in table order.
    pub const ALL: [EventKind; EventKind::COUNT] = [
        EventKind::Supply,
        EventKind::Withdraw,
        EventKind::Borrow,
        EventKind::Repay,
        EventKind::SupplyCollateral,
        EventKind::WithdrawCollateral,
        EventKind::LiquidationBadDebt,
        EventKind::LiquidationRepaid,
        EventKind::LiquidationSeized,
        EventKind::InterestSupply,
        EventKind::InterestBorrow,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn sign_policy(self) -> SignPolicy {
        SIGN_POLICY[self.index()]
    }

    #[must_use]
    pub fn category(self) -> Category {
        self.sign_policy().category
    }

    /// Apply this kind's sign to a non-negative magnitude.
    #[must_use]
    pub fn signed_amount(self, amount: Decimal) -> Decimal {
        match self.sign_policy().sign {
            Sign::Credit => amount,
            Sign::Debit => -amount,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Supply => "Supply",
            EventKind::Withdraw => "Withdraw",
            EventKind::Borrow => "Borrow",
            EventKind::Repay => "Repay",
            EventKind::SupplyCollateral => "SupplyCollateral",
            EventKind::WithdrawCollateral => "WithdrawCollateral",
            EventKind::LiquidationBadDebt => "LiquidationBadDebt",
            EventKind::LiquidationRepaid => "LiquidationRepaid",
            EventKind::LiquidationSeized => "LiquidationSeized",
            EventKind::InterestSupply => "InterestSupply",
            EventKind::InterestBorrow => "InterestBorrow",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_lowercase() == normalized)
            .ok_or_else(|| CoreError::UnknownEventKind(s.trim().to_string()))
    }
}

impl TryFrom<String> for EventKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One observed on-chain action for a vault on a given day.
///
/// Amounts are USD magnitudes and never negative; direction comes from `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Day of the action (daily granularity)
    pub day: NaiveDate,

    pub kind: EventKind,

    /// USD magnitude (always >= 0)
    pub amount_usd: Decimal,
}

impl Event {
    /// Create an event, rejecting negative amounts.
    pub fn new(day: NaiveDate, kind: EventKind, amount_usd: Decimal) -> Result<Self, CoreError> {
        let event = Self {
            day,
            kind,
            amount_usd,
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the amount invariant. Deserialized events bypass `new`, so
    /// importers call this explicitly.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.amount_usd.is_sign_negative() && !self.amount_usd.is_zero() {
            return Err(CoreError::ValidationError(format!(
                "{} amount on {} must not be negative (got {})",
                self.kind, self.day, self.amount_usd
            )));
        }
        Ok(())
    }

    /// Signed contribution of this event to its category total.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed_amount(self.amount_usd)
    }
}

/// Loosely typed event as it appears in external JSON exports.
///
/// `kind` stays a string here so an unrecognised kind surfaces as
/// `CoreError::UnknownEventKind` rather than a generic parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(alias = "date")]
    pub day: NaiveDate,

    #[serde(alias = "event_kind", alias = "type")]
    pub kind: String,

    #[serde(alias = "amount")]
    pub amount_usd: Decimal,
}

impl TryFrom<EventRecord> for Event {
    type Error = CoreError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let kind = record.kind.parse()?;
        Event::new(record.day, kind, record.amount_usd)
    }
}
