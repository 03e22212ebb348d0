//! PDF text decoding module.

mod decoder;

pub use decoder::{PdfContent, PdfDecoder};

use crate::error::PdfError;

/// Type of PDF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains extractable text.
    Text,
    /// Contains only images (scanned document).
    Image,
    /// Contains both text and images.
    Hybrid,
    /// Empty or unreadable.
    Empty,
}

impl PdfType {
    /// Whether the text layer alone is not enough and OCR should run.
    pub fn needs_ocr(&self) -> bool {
        matches!(self, PdfType::Image | PdfType::Empty)
    }
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Analyze the PDF to determine its type, keeping the decoded text.
    fn analyze(&self) -> PdfContent;

    /// Extract text from the entire PDF.
    fn extract_text(&self) -> Result<String>;
}
