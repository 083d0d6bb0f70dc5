use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CoreError;
use crate::models::event::{Event, EventKind};
use crate::services::aggregation_service::LedgerAggregator;

use super::format;

/// On-disk form of an event. The amount is rust_decimal's exact 16-byte encoding.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEvent {
    day: NaiveDate,
    kind: EventKind,
    amount: [u8; 16],
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredLedger {
    vault: Option<String>,
    events: Vec<StoredEvent>,
}

/// A ledger as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedLedger {
    pub vault: Option<String>,
    pub events: Vec<Event>,
}

/// Save/load event ledgers to/from bytes or files.
pub struct LedgerStore;

impl LedgerStore {
    /// Serialize a ledger to VLDG bytes.
    ///
    /// Flow: events → bincode → VLDG header + payload
    pub fn save_to_bytes(vault: Option<&str>, events: &[Event]) -> Result<Vec<u8>, CoreError> {
        let stored = StoredLedger {
            vault: vault.map(str::to_string),
            events: events
                .iter()
                .map(|e| StoredEvent {
                    day: e.day,
                    kind: e.kind,
                    amount: e.amount_usd.serialize(),
                })
                .collect(),
        };

        let payload = bincode::serialize(&stored)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize ledger: {e}")))?;

        debug!(events = events.len(), bytes = payload.len(), "serialized ledger");
        Ok(format::write_file(format::CURRENT_VERSION, &payload))
    }

    /// Parse VLDG bytes back into a ledger.
    ///
    /// Decoded events are re-validated: amounts must be non-negative and days
    /// must not decrease.
    pub fn load_from_bytes(data: &[u8]) -> Result<LoadedLedger, CoreError> {
        let (header, payload) = format::read_file(data)?;

        let stored: StoredLedger = bincode::deserialize(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize ledger: {e}")))?;

        let events = stored
            .events
            .into_iter()
            .map(|s| Event::new(s.day, s.kind, Decimal::deserialize(s.amount)))
            .collect::<Result<Vec<_>, _>>()?;
        LedgerAggregator::new().check_order(&events)?;

        debug!(version = header.version, events = events.len(), "loaded ledger");
        Ok(LoadedLedger {
            vault: stored.vault,
            events,
        })
    }

    /// Save a ledger file to disk.
    pub fn save_to_file(
        path: impl AsRef<Path>,
        vault: Option<&str>,
        events: &[Event],
    ) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(vault, events)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a ledger file from disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<LoadedLedger, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }
}
