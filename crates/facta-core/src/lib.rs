//! Core library for invoice amount extraction and reconciliation.
//!
//! This crate provides:
//! - PDF text decoding
//! - Spanish/English invoice field extraction (amounts, number, date, currency)
//! - Reconciliation of extracted totals against their components
//! - A persisted pattern cache keyed by document fingerprint
//! - Currency-grouped reporting

pub mod error;
pub mod invoice;
pub mod models;
pub mod pdf;
pub mod report;
pub mod store;

pub use error::{FactaError, Result};
pub use invoice::{
    deduplicate, CascadeState, DocumentKind, ExtractionOrchestrator, ExtractionStrategy,
    SourceDocument,
};
pub use models::{AmountSet, Amounts, Currency, ExtractionMethod, FactaConfig, InvoiceRecord};
pub use pdf::{PdfContent, PdfDecoder, PdfProcessor, PdfType};
pub use report::Report;
pub use store::{ExtractionPattern, PatternStore};
