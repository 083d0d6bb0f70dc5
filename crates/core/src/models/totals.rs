use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::event::{Category, Event};
use crate::errors::CoreError;

/// The three running accumulators of the ledger fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub supply: Decimal,
    pub borrow: Decimal,
    pub collateral: Decimal,
}

impl Totals {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, category: Category) -> Decimal {
        match category {
            Category::Supply => self.supply,
            Category::Borrow => self.borrow,
            Category::Collateral => self.collateral,
        }
    }

    /// Fold one event into its category total.
    pub fn apply(&mut self, event: &Event) -> Result<(), CoreError> {
        let slot = match event.kind.category() {
            Category::Supply => &mut self.supply,
            Category::Borrow => &mut self.borrow,
            Category::Collateral => &mut self.collateral,
        };
        *slot = slot.checked_add(event.signed_amount()).ok_or_else(|| {
            CoreError::ArithmeticOverflow(format!(
                "{:?} total after {} {} on {}",
                event.kind.category(),
                event.kind,
                event.amount_usd,
                event.day
            ))
        })?;
        Ok(())
    }
}
