//! Data models for invoice records and configuration.

pub mod config;
pub mod record;

pub use config::FactaConfig;
pub use record::{AmountSet, Amounts, Currency, ExtractionMethod, InvoiceRecord};
