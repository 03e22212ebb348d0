//! PDF text decoding using lopdf and pdf-extract.

use lopdf::{Document, Object};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, PdfType, Result};
use crate::error::PdfError;

/// Text layer decoder. Scanned pages are only counted, never decoded; they
/// are left to the OCR collaborator.
pub struct PdfDecoder {
    document: Option<Document>,
    raw_data: Vec<u8>,
    min_text_length: usize,
}

/// Decoded content of a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfContent {
    /// Type of PDF content.
    pub pdf_type: PdfType,
    /// Extracted text (if any).
    pub text: String,
    pub page_count: u32,
    /// Image XObjects found in the document.
    pub image_count: usize,
}

impl PdfDecoder {
    /// Create a decoder; text shorter than `min_text_length` does not count
    /// as a text layer.
    pub fn new(min_text_length: usize) -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
            min_text_length,
        }
    }

    /// Load and analyze a PDF in one step.
    pub fn decode(data: &[u8], min_text_length: usize) -> Result<PdfContent> {
        let mut decoder = Self::new(min_text_length);
        decoder.load(data)?;
        Ok(decoder.analyze())
    }

    /// Count image XObjects across the document.
    pub fn image_count(&self) -> usize {
        let Some(doc) = self.document.as_ref() else {
            return 0;
        };

        let count = doc
            .objects
            .values()
            .filter(|object| match object {
                Object::Stream(stream) => stream
                    .dict
                    .get(b"Subtype")
                    .and_then(Object::as_name)
                    .map(|name| name == b"Image")
                    .unwrap_or(false),
                _ => false,
            })
            .count();
        trace!("Found {} image objects", count);
        count
    }
}

impl Default for PdfDecoder {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Classify a PDF by the amount of decoded text and the images it carries.
pub(crate) fn classify(text_len: usize, image_count: usize, min_text_length: usize) -> PdfType {
    match (text_len > min_text_length, image_count > 0) {
        (true, false) => PdfType::Text,
        (false, true) => PdfType::Image,
        (true, true) => PdfType::Hybrid,
        (false, false) => PdfType::Empty,
    }
}

impl PdfProcessor for PdfDecoder {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn analyze(&self) -> PdfContent {
        let text = match self.extract_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("{}", e);
                String::new()
            }
        };
        let image_count = self.image_count();
        let pdf_type = classify(text.trim().len(), image_count, self.min_text_length);

        debug!(
            "PDF analysis: {} chars text, {} images -> {:?}",
            text.len(),
            image_count,
            pdf_type
        );
        PdfContent {
            pdf_type,
            text,
            page_count: self.page_count(),
            image_count,
        }
    }

    fn extract_text(&self) -> Result<String> {
        if self.document.is_none() {
            return Err(PdfError::Parse("No document loaded".to_string()));
        }
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();
        data
    }

    #[test]
    fn test_decoder_new() {
        let decoder = PdfDecoder::default();
        assert!(decoder.document.is_none());
        assert_eq!(decoder.page_count(), 0);
        assert_eq!(decoder.image_count(), 0);
        assert!(decoder.extract_text().is_err());
    }

    #[test]
    fn test_load_counts_pages() {
        let mut decoder = PdfDecoder::default();
        decoder.load(&blank_pdf(2)).unwrap();
        assert_eq!(decoder.page_count(), 2);
        assert_eq!(decoder.image_count(), 0);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let mut decoder = PdfDecoder::default();
        assert!(matches!(decoder.load(b"not a pdf"), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(200, 0, 50), PdfType::Text);
        assert_eq!(classify(10, 1, 50), PdfType::Image);
        assert_eq!(classify(200, 3, 50), PdfType::Hybrid);
        assert_eq!(classify(0, 0, 50), PdfType::Empty);
        assert!(PdfType::Image.needs_ocr());
        assert!(!PdfType::Hybrid.needs_ocr());
    }
}
