pub mod aggregation_service;
pub mod range_service;
pub mod reconciliation_service;
