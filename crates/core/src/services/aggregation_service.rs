use std::borrow::Borrow;
use std::iter::{FusedIterator, Peekable};

use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::errors::CoreError;
use crate::models::event::Event;
use crate::models::snapshot::DailySnapshot;
use crate::models::totals::Totals;

/// Folds a day-ordered event stream into cumulative daily snapshots.
///
/// Equivalent to `SUM(delta) OVER (ORDER BY day)` per category, evaluated
/// once per distinct day. Pure business logic with no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerAggregator;

impl LedgerAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Lazily yield one snapshot per distinct day.
    ///
    /// Input must be ordered by day. The first out-of-order event is yielded
    /// as `Err(CoreError::UnorderedInput)` in place of the snapshot of the day
    /// it interrupts, after which the iterator is exhausted.
    pub fn snapshots<I>(&self, events: I) -> Snapshots<I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Borrow<Event>,
    {
        Snapshots::new(events.into_iter())
    }

    /// Compute the whole series. All-or-nothing: any error means no snapshots.
    pub fn aggregate<I>(&self, events: I) -> Result<Vec<DailySnapshot>, CoreError>
    where
        I: IntoIterator,
        I::Item: Borrow<Event>,
    {
        let snapshots = self.snapshots(events).collect::<Result<Vec<_>, _>>()?;
        debug!(days = snapshots.len(), "aggregated event history");
        Ok(snapshots)
    }

    /// Verify that days never decrease, without computing anything.
    pub fn check_order<I>(&self, events: I) -> Result<(), CoreError>
    where
        I: IntoIterator,
        I::Item: Borrow<Event>,
    {
        let mut previous: Option<NaiveDate> = None;
        for event in events {
            let day = day_of(&event);
            if let Some(prev) = previous {
                if day < prev {
                    return Err(CoreError::UnorderedInput {
                        previous: prev,
                        found: day,
                    });
                }
            }
            previous = Some(day);
        }
        Ok(())
    }
}

fn day_of<E: Borrow<Event>>(event: &E) -> NaiveDate {
    event.borrow().day
}

/// Iterator returned by [`LedgerAggregator::snapshots`].
///
/// Holds the three accumulators and one peeked event; memory use does not
/// grow with the length of the input.
pub struct Snapshots<I: Iterator> {
    events: Peekable<I>,
    totals: Totals,
    done: bool,
}

impl<I> Snapshots<I>
where
    I: Iterator,
    I::Item: Borrow<Event>,
{
    fn new(events: I) -> Self {
        Self {
            events: events.peekable(),
            totals: Totals::new(),
            done: false,
        }
    }

    /// Running totals after the last emitted day.
    #[must_use]
    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    fn apply(&mut self, event: &Event) -> Result<(), CoreError> {
        event.validate()?;
        self.totals.apply(event)
    }

    /// Consume every event of the next day and build its snapshot.
    fn fold_next_day(&mut self) -> Option<Result<DailySnapshot, CoreError>> {
        let first = self.events.next()?;
        let first: &Event = first.borrow();
        let day = first.day;
        if let Err(e) = self.apply(first) {
            return Some(Err(e));
        }

        loop {
            let next_day = match self.events.peek() {
                Some(next) => day_of(next),
                None => break,
            };
            if next_day < day {
                return Some(Err(CoreError::UnorderedInput {
                    previous: day,
                    found: next_day,
                }));
            }
            if next_day > day {
                break;
            }
            if let Some(event) = self.events.next() {
                let event: &Event = event.borrow();
                if let Err(e) = self.apply(event) {
                    return Some(Err(e));
                }
            }
        }

        let snapshot = DailySnapshot::from_totals(day, &self.totals);
        if let Ok(s) = &snapshot {
            trace!(%day, supply = %s.supply_amount_usd, borrow = %s.borrow_amount_usd,
                collateral = %s.collateral_amount_usd, ratio = %s.ratio, "day closed");
        }
        Some(snapshot)
    }
}

impl<I> Iterator for Snapshots<I>
where
    I: Iterator,
    I::Item: Borrow<Event>,
{
    type Item = Result<DailySnapshot, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.fold_next_day();
        match &item {
            None | Some(Err(_)) => self.done = true,
            Some(Ok(_)) => {}
        }
        item
    }
}

impl<I> FusedIterator for Snapshots<I>
where
    I: Iterator,
    I::Item: Borrow<Event>,
{
}
