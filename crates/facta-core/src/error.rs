//! Error types for the facta-core library.

use thiserror::Error;

/// Main error type for the facta library.
#[derive(Error, Debug)]
pub enum FactaError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Invoice extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Pattern store error.
    #[error("pattern store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document collaborator produced no text at all.
    #[error("no text could be obtained for {0}")]
    NoText(String),

    /// Processing of the document was aborted before it produced a record.
    #[error("processing aborted: {0}")]
    Aborted(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to invoice field extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// A numeric capture could not be converted.
    #[error("failed to parse {field}: {value:?}")]
    Parse { field: String, value: String },

    /// A strategy ran but produced no usable total.
    #[error("{strategy} strategy produced no usable total")]
    NoTotal { strategy: String },

    /// Every strategy in the cascade was exhausted.
    #[error("no invoice data found")]
    NoData,

    /// A manual override named an unknown field or carried an invalid value.
    #[error("invalid override for {field}: {reason}")]
    Override { field: String, reason: String },
}

/// Errors related to the persisted pattern store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the store file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The store file is not valid JSON for the expected schema.
    #[error("corrupt pattern store: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The store file was written by an incompatible schema version.
    #[error("unsupported pattern store version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

/// Result type for the facta library.
pub type Result<T> = std::result::Result<T, FactaError>;
