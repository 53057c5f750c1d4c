//! Document text extraction, dispatched on file-name suffix.

pub mod docx;
pub mod pdf;

use std::path::Path;

use crate::error::ProcessError;

/// Container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    /// Office Open XML (`.docx`; `.doc` uploads take the same path).
    Office,
}

impl DocumentKind {
    /// `.pdf` → `Pdf`; `.docx` / `.doc` → `Office`, case-insensitive.
    pub fn from_filename(name: &str) -> Result<Self, ProcessError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" | "doc" => Ok(DocumentKind::Office),
            _ => Err(ProcessError::UnsupportedKind(extension)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Office => "office",
        }
    }
}

pub trait DocumentProcessor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, kind: DocumentKind) -> bool;
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: vec![
                Box::new(pdf::PdfProcessor::new()),
                Box::new(docx::DocxProcessor::new()),
            ],
        }
    }

    /// Linear text of the document at `path`, read as `kind`.
    pub fn extract(&self, path: &Path, kind: DocumentKind) -> Result<String, ProcessError> {
        self.processors
            .iter()
            .find(|p| p.supports(kind))
            .ok_or_else(|| ProcessError::UnsupportedKind(kind.as_str().to_string()))?
            .extract(path)
    }

    /// Like [`ProcessorRegistry::extract`], taking the kind from `path`'s suffix.
    pub fn extract_path(&self, path: &Path) -> Result<String, ProcessError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        self.extract(path, DocumentKind::from_filename(name)?)
    }
}
