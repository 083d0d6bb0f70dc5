pub mod event;
pub mod reconciliation;
pub mod settings;
pub mod snapshot;
pub mod totals;
