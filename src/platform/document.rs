// TermSleuth - platform/document.rs
//
// Document text extraction.
//
// A `DocumentHandle` owns everything the extractor allocated for one
// document. It is dropped at the end of the caller's per-file block on every
// path, including early returns after a page failure, so memory is released
// per document rather than accumulating over a long scan. Page text is
// returned as an owned String and dropped after each page is matched.

use crate::util::error::ExtractionError;
use std::collections::BTreeMap;

/// An opened document.
pub trait DocumentHandle {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Plain text of the page at 0-based `index`.
    fn page_text(&self, index: usize) -> Result<String, ExtractionError>;
}

/// Opens documents for per-page text extraction.
pub trait DocumentExtractor: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ExtractionError>;
}

// =============================================================================
// PDF (lopdf)
// =============================================================================

/// PDF extractor backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

struct PdfHandle {
    doc: lopdf::Document,
    /// 1-based lopdf page numbers in document order.
    page_numbers: Vec<u32>,
}

impl DocumentExtractor for PdfExtractor {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ExtractionError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Open {
            source: Box::new(e),
        })?;
        let pages: BTreeMap<u32, lopdf::ObjectId> = doc.get_pages();
        let page_numbers = pages.into_keys().collect();
        Ok(Box::new(PdfHandle { doc, page_numbers }))
    }
}

impl DocumentHandle for PdfHandle {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractionError> {
        let number = *self
            .page_numbers
            .get(index)
            .ok_or(ExtractionError::PageOutOfRange {
                index,
                page_count: self.page_numbers.len(),
            })?;
        self.doc
            .extract_text(&[number])
            .map_err(|e| ExtractionError::Page {
                index,
                source: Box::new(e),
            })
    }
}
