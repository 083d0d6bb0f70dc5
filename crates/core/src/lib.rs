pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use models::{
    event::{Event, EventRecord},
    reconciliation::{ReconciliationReport, TvlObservation},
    settings::Settings,
    snapshot::DailySnapshot,
};
use services::{
    aggregation_service::{LedgerAggregator, Snapshots},
    range_service,
    reconciliation_service::ReconciliationService,
};
use storage::{
    csv_io,
    manager::{LedgerStore, LoadedLedger},
};
use tracing::{debug, info};

use errors::CoreError;

/// Main entry point for the vault-metrics-core library.
///
/// Holds the append-only event history of one vault and derives every
/// metric series from it on demand. Snapshots are never stored: each query
/// replays the history through the [`LedgerAggregator`].
#[must_use]
pub struct VaultLedger {
    events: Vec<Event>,
    settings: Settings,
    aggregator: LedgerAggregator,
    reconciliation_service: ReconciliationService,
}

impl std::fmt::Debug for VaultLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultLedger")
            .field("vault", &self.settings.vault)
            .field("events", &self.events.len())
            .field("first_day", &self.first_day())
            .field("last_day", &self.last_day())
            .finish()
    }
}

impl Default for VaultLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultLedger {
    /// Create an empty ledger with default settings.
    pub fn new() -> Self {
        Self::build(Vec::new(), Settings::default())
    }

    /// Create an empty ledger with the given settings.
    pub fn with_settings(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self::build(Vec::new(), settings))
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Append one event. Its day must not precede the last recorded day.
    pub fn append_event(&mut self, event: Event) -> Result<(), CoreError> {
        Self::check_append(self.last_day(), &event)?;
        self.events.push(event);
        Ok(())
    }

    /// Append several events. If any of them fails validation, none are
    /// appended (all-or-nothing). Returns the number appended.
    pub fn append_events(&mut self, events: Vec<Event>) -> Result<usize, CoreError> {
        let mut last = self.last_day();
        for event in &events {
            Self::check_append(last, event)?;
            last = Some(event.day);
        }
        let count = events.len();
        self.events.extend(events);
        debug!(appended = count, total = self.events.len(), "appended events");
        Ok(count)
    }

    /// All events in the order they were recorded (oldest first).
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events recorded on a single day.
    #[must_use]
    pub fn events_on(&self, day: NaiveDate) -> &[Event] {
        let start = self.events.partition_point(|e| e.day < day);
        let end = self.events.partition_point(|e| e.day <= day);
        &self.events[start..end]
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.events.first().map(|e| e.day)
    }

    #[must_use]
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.events.last().map(|e| e.day)
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Lazy snapshot stream over the recorded history.
    pub fn snapshot_iter(&self) -> Snapshots<std::slice::Iter<'_, Event>> {
        self.aggregator.snapshots(&self.events)
    }

    /// Full daily series, one snapshot per day with events.
    pub fn snapshots(&self) -> Result<Vec<DailySnapshot>, CoreError> {
        self.aggregator.aggregate(&self.events)
    }

    /// Snapshot in effect on `day`: that of the last recorded day at or before it.
    /// `None` if no events precede or fall on `day`.
    pub fn snapshot_on(&self, day: NaiveDate) -> Result<Option<DailySnapshot>, CoreError> {
        let end = self.events.partition_point(|e| e.day <= day);
        self.aggregator.snapshots(&self.events[..end]).last().transpose()
    }

    /// Snapshot of the most recent day.
    pub fn latest_snapshot(&self) -> Result<Option<DailySnapshot>, CoreError> {
        self.snapshot_iter().last().transpose()
    }

    /// Snapshots for days in `from..=to`. Totals still include all earlier history.
    pub fn snapshots_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySnapshot>, CoreError> {
        range_service::validate_range(from, to)?;
        let end = self.events.partition_point(|e| e.day <= to);
        let series = self.aggregator.aggregate(&self.events[..end])?;
        Ok(range_service::filter_range(&series, from, to)?.to_vec())
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Compare the computed TVL series with a reference series.
    pub fn reconcile_tvl(
        &self,
        reference: &[TvlObservation],
    ) -> Result<ReconciliationReport, CoreError> {
        let snapshots = self.snapshots()?;
        let report = self.reconciliation_service.reconcile(&snapshots, reference);
        info!(
            vault = self.settings.vault.as_deref().unwrap_or("-"),
            overlap = report.overlap_count,
            correlation = ?report.correlation,
            "TVL reconciliation finished"
        );
        Ok(report)
    }

    /// Read a reference TVL CSV export and compare it with the computed series.
    pub fn reconcile_tvl_csv<R: Read>(&self, input: R) -> Result<ReconciliationReport, CoreError> {
        let reference = csv_io::read_tvl_series(input, self.settings.csv_delimiter)?;
        self.reconcile_tvl(&reference)
    }

    // ── Import / Export ─────────────────────────────────────────────

    /// Import events from a JSON array. Returns the number imported.
    /// All-or-nothing, like [`VaultLedger::append_events`].
    pub fn import_events_from_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let records: Vec<EventRecord> = serde_json::from_str(json)?;
        let events = records
            .into_iter()
            .map(Event::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.append_events(events)
    }

    /// Import events from CSV (`day,kind,amount_usd`). Returns the number imported.
    pub fn import_events_from_csv<R: Read>(&mut self, input: R) -> Result<usize, CoreError> {
        let events = csv_io::read_events(input, self.settings.csv_delimiter)?;
        self.append_events(events)
    }

    /// Export the recorded events as JSON.
    pub fn export_events_to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.events)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize events to JSON: {e}")))
    }

    /// Export the snapshot series as JSON. Undefined ratios are `null`.
    pub fn export_snapshots_to_json(&self) -> Result<String, CoreError> {
        let mut snapshots = self.snapshots()?;
        if let Some(dp) = self.settings.ratio_scale {
            for s in &mut snapshots {
                s.ratio = s.ratio.rounded(dp);
            }
        }
        serde_json::to_string_pretty(&snapshots)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshots to JSON: {e}")))
    }

    /// Export the snapshot series as CSV with header.
    pub fn export_snapshots_to_csv(&self) -> Result<String, CoreError> {
        csv_io::snapshots_to_csv_string(&self.snapshots()?, &self.settings)
    }

    /// Append the snapshot series to a CSV file (header only for a new file).
    pub fn append_snapshots_to_csv_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        csv_io::append_snapshots_to_file(path, &self.snapshots()?, &self.settings)
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Serialize the event history to VLDG bytes.
    pub fn save_to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        LedgerStore::save_to_bytes(self.settings.vault.as_deref(), &self.events)
    }

    /// Restore a ledger from VLDG bytes. The stored vault label is kept.
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        Ok(Self::from_loaded(LedgerStore::load_from_bytes(data)?))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        LedgerStore::save_to_file(path, self.settings.vault.as_deref(), &self.events)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self::from_loaded(LedgerStore::load_from_file(path)?))
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings after validating them.
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), CoreError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    // ── Internal ────────────────────────────────────────────────────

    fn check_append(last: Option<NaiveDate>, event: &Event) -> Result<(), CoreError> {
        event.validate()?;
        if let Some(previous) = last {
            if event.day < previous {
                return Err(CoreError::UnorderedInput {
                    previous,
                    found: event.day,
                });
            }
        }
        Ok(())
    }

    fn from_loaded(loaded: LoadedLedger) -> Self {
        let settings = Settings {
            vault: loaded.vault,
            ..Settings::default()
        };
        Self::build(loaded.events, settings)
    }

    fn build(events: Vec<Event>, settings: Settings) -> Self {
        Self {
            events,
            settings,
            aggregator: LedgerAggregator::new(),
            reconciliation_service: ReconciliationService::new(),
        }
    }
}
