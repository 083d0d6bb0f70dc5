use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::event::{Event, EventKind};
use crate::models::reconciliation::TvlObservation;
use crate::models::settings::Settings;
use crate::models::snapshot::DailySnapshot;

/// Column header for snapshot exports.
pub const SNAPSHOT_HEADER: [&str; 8] = [
    "day",
    "vault",
    "supply_amount_usd",
    "borrow_amount_usd",
    "collateral_amount_usd",
    "tvl_amount_usd",
    "pure_tvl_amount_usd",
    "ratio",
];

const EVENT_DAY_COLUMNS: &[&str] = &["day", "date"];
const EVENT_KIND_COLUMNS: &[&str] = &["kind", "event_kind", "type", "event_type"];
const EVENT_AMOUNT_COLUMNS: &[&str] = &["amount_usd", "amount"];

/// Date columns recognised in reference TVL exports, in priority order.
pub const TVL_DATE_COLUMNS: &[&str] = &["date", "day", "timestamp", "time"];

/// TVL columns recognised in reference TVL exports, in priority order.
pub const TVL_VALUE_COLUMNS: &[&str] = &[
    "tvl",
    "tvl_amount_usd",
    "total_value_locked",
    "value",
    "tvlusd",
];

// ── Parsing helpers ────────────────────────────────────────────────

/// Parse a day from `YYYY-MM-DD`, a date-time string starting with one
/// (`2025-01-15 00:00:00.000 UTC`, `2025-01-15T00:00:00Z`) or unix seconds.
///
/// An all-digit value is unix seconds, except an 8-digit value that reads as
/// a compact `YYYYMMDD` date. Timestamps between 1970-04-26 and 1973-03-03
/// (exactly eight digits) therefore need the date form.
pub fn parse_day(raw: &str) -> Result<NaiveDate, CoreError> {
    let value = raw.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(day) = compact_date(value) {
            return Ok(day);
        }
        let secs: i64 = value
            .parse()
            .map_err(|_| CoreError::ValidationError(format!("Invalid timestamp '{value}'")))?;
        return DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| CoreError::ValidationError(format!("Timestamp out of range '{value}'")));
    }

    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| CoreError::ValidationError(format!("Invalid date '{value}': {e}")))
}

fn compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 {
        return None;
    }
    let year = value.get(0..4)?.parse().ok()?;
    let month = value.get(4..6)?.parse().ok()?;
    let day = value.get(6..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a USD amount, accepting plain and scientific notation.
pub fn parse_amount(raw: &str) -> Result<Decimal, CoreError> {
    let value = raw.trim();
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| CoreError::ValidationError(format!("Invalid amount '{value}': {e}")))
}

fn find_column(headers: &StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(candidate))
    })
}

fn require_column(headers: &StringRecord, candidates: &[&str], what: &str) -> Result<usize, CoreError> {
    find_column(headers, candidates).ok_or_else(|| {
        CoreError::ValidationError(format!(
            "No {what} column found (expected one of {candidates:?}, available: {:?})",
            headers.iter().collect::<Vec<_>>()
        ))
    })
}

fn reader<R: Read>(input: R, delimiter: u8) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input)
}

fn row_context(record: &StringRecord) -> String {
    record
        .position()
        .map_or_else(|| "unknown line".to_string(), |p| format!("line {}", p.line()))
}

// ── Import ─────────────────────────────────────────────────────────

/// Read events from CSV with `day`, `kind` and `amount_usd` columns.
///
/// Rows are returned in file order. Ordering is checked later by the
/// aggregator, never fixed up here.
pub fn read_events<R: Read>(input: R, delimiter: u8) -> Result<Vec<Event>, CoreError> {
    let mut rdr = reader(input, delimiter);
    let headers = rdr.headers()?.clone();
    let day_col = require_column(&headers, EVENT_DAY_COLUMNS, "day")?;
    let kind_col = require_column(&headers, EVENT_KIND_COLUMNS, "event kind")?;
    let amount_col = require_column(&headers, EVENT_AMOUNT_COLUMNS, "amount")?;

    let mut events = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let kind = EventKind::from_str(field(kind_col)).map_err(|e| match e {
            CoreError::UnknownEventKind(raw) => {
                CoreError::UnknownEventKind(format!("{raw} ({})", row_context(&record)))
            }
            other => other,
        })?;
        let day = parse_day(field(day_col))
            .map_err(|e| CoreError::ValidationError(format!("{}: {e}", row_context(&record))))?;
        let amount = parse_amount(field(amount_col))
            .map_err(|e| CoreError::ValidationError(format!("{}: {e}", row_context(&record))))?;

        events.push(Event::new(day, kind, amount)?);
    }

    debug!(events = events.len(), "read events from CSV");
    Ok(events)
}

/// Read a reference TVL series, detecting the date and TVL columns by name.
///
/// Rows with an empty TVL cell are skipped. Several rows for the same day
/// are averaged. The result is sorted by day.
pub fn read_tvl_series<R: Read>(input: R, delimiter: u8) -> Result<Vec<TvlObservation>, CoreError> {
    let mut rdr = reader(input, delimiter);
    let headers = rdr.headers()?.clone();
    let date_col = require_column(&headers, TVL_DATE_COLUMNS, "date")?;
    let tvl_col = require_column(&headers, TVL_VALUE_COLUMNS, "TVL")?;

    let mut by_day: BTreeMap<NaiveDate, (Decimal, u32)> = BTreeMap::new();
    let mut skipped = 0usize;
    for record in rdr.records() {
        let record = record?;
        let raw_tvl = record.get(tvl_col).unwrap_or("");
        if raw_tvl.is_empty() {
            skipped += 1;
            continue;
        }
        let day = parse_day(record.get(date_col).unwrap_or(""))
            .map_err(|e| CoreError::ValidationError(format!("{}: {e}", row_context(&record))))?;
        let tvl = parse_amount(raw_tvl)
            .map_err(|e| CoreError::ValidationError(format!("{}: {e}", row_context(&record))))?;

        let entry = by_day.entry(day).or_insert((Decimal::ZERO, 0));
        entry.0 = entry
            .0
            .checked_add(tvl)
            .ok_or_else(|| CoreError::ArithmeticOverflow(format!("TVL sum on {day}")))?;
        entry.1 += 1;
    }

    let series: Vec<TvlObservation> = by_day
        .into_iter()
        .map(|(day, (sum, count))| TvlObservation::new(day, sum / Decimal::from(count)))
        .collect();

    debug!(days = series.len(), skipped, "read reference TVL series");
    Ok(series)
}

// ── Export ─────────────────────────────────────────────────────────

fn snapshot_record(snapshot: &DailySnapshot, settings: &Settings) -> [String; 8] {
    let ratio = match settings.ratio_scale {
        Some(dp) => snapshot.ratio.rounded(dp),
        None => snapshot.ratio,
    };
    [
        snapshot.day.to_string(),
        settings.vault.clone().unwrap_or_default(),
        snapshot.supply_amount_usd.to_string(),
        snapshot.borrow_amount_usd.to_string(),
        snapshot.collateral_amount_usd.to_string(),
        snapshot.tvl_amount_usd.to_string(),
        snapshot.pure_tvl_amount_usd.to_string(),
        ratio.value().map(|r| r.to_string()).unwrap_or_default(),
    ]
}

/// Write snapshots as CSV. An undefined ratio is written as an empty cell.
pub fn write_snapshots<W: Write>(
    output: W,
    snapshots: &[DailySnapshot],
    settings: &Settings,
    include_header: bool,
) -> Result<(), CoreError> {
    let mut writer = WriterBuilder::new()
        .delimiter(settings.csv_delimiter)
        .from_writer(output);

    if include_header {
        writer.write_record(SNAPSHOT_HEADER)?;
    }
    for snapshot in snapshots {
        writer.write_record(snapshot_record(snapshot, settings))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render snapshots as a CSV string with header.
pub fn snapshots_to_csv_string(
    snapshots: &[DailySnapshot],
    settings: &Settings,
) -> Result<String, CoreError> {
    let mut buf = Vec::new();
    write_snapshots(&mut buf, snapshots, settings, true)?;
    String::from_utf8(buf).map_err(|e| CoreError::Serialization(format!("CSV is not UTF-8: {e}")))
}

/// Append snapshots to a CSV file, creating it if needed.
/// The header is written only when the file is new or empty.
pub fn append_snapshots_to_file(
    path: impl AsRef<Path>,
    snapshots: &[DailySnapshot],
    settings: &Settings,
) -> Result<(), CoreError> {
    let path = path.as_ref();
    let write_header = std::fs::metadata(path).map_or(true, |m| m.len() == 0);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    write_snapshots(file, snapshots, settings, write_header)?;
    info!(path = %path.display(), rows = snapshots.len(), "appended snapshots");
    Ok(())
}
