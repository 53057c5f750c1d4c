use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentKind, DocumentProcessor};

/// PDFs with an embedded text layer. Scanned PDFs yield empty text.
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for PdfProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::DecodeError(format!("Failed to load PDF: {}", e)))?;

        extract_text_from_pdf(&doc)
    }

    fn supports(&self, kind: DocumentKind) -> bool {
        matches!(kind, DocumentKind::Pdf)
    }
}

/// Concatenates the text of every page in page order. Any page that
/// cannot be decoded fails the whole document.
fn extract_text_from_pdf(doc: &lopdf::Document) -> Result<String, ProcessError> {
    let mut pages = Vec::new();

    for (page_num, _) in doc.get_pages() {
        let page_text = doc.extract_text(&[page_num]).map_err(|e| {
            ProcessError::DecodeError(format!("Failed to extract text of page {}: {}", page_num, e))
        })?;
        pages.push(page_text.trim_end().to_string());
    }

    Ok(pages.join("\n"))
}
