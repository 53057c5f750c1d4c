use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ProcessError;
use crate::processor::{DocumentKind, DocumentProcessor};

const DOCUMENT_PART: &str = "word/document.xml";

/// Office Open XML word-processing documents.
pub struct DocxProcessor;

impl DocxProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for DocxProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let file = std::fs::File::open(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ProcessError::CorruptContainer(format!("not a ZIP container: {}", e)))?;

        let xml = read_document_part(&mut archive)?;
        parse_document_xml(&xml)
    }

    fn supports(&self, kind: DocumentKind) -> bool {
        matches!(kind, DocumentKind::Office)
    }
}

fn read_document_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ProcessError> {
    let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => ProcessError::MissingPart(DOCUMENT_PART.to_string()),
        other => ProcessError::CorruptContainer(format!("{}: {}", DOCUMENT_PART, other)),
    })?;

    let mut bytes = Vec::new();
    part.read_to_end(&mut bytes)
        .map_err(|e| ProcessError::CorruptContainer(format!("{}: {}", DOCUMENT_PART, e)))?;

    // The prologue's encoding declaration is ignored.
    String::from_utf8(bytes)
        .map_err(|e| ProcessError::DecodeError(format!("{} is not UTF-8: {}", DOCUMENT_PART, e)))
}

/// Run texts (`w:t`) are concatenated without separator inside a paragraph
/// (`w:p`); paragraphs are joined by `\n` and whitespace-only ones dropped.
///
/// Paragraphs nest inside text boxes (`w:txbxContent`). Each open paragraph
/// keeps its own buffer; an inner paragraph is emitted when it closes and
/// the outer one continues where it left off.
fn parse_document_xml(xml: &str) -> Result<String, ProcessError> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(text) = open.pop() {
                        if !text.trim().is_empty() {
                            paragraphs.push(text);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let decoded = e
                    .decode()
                    .map_err(|err| ProcessError::DecodeError(format!("run text: {}", err)))?;
                push_run_text(&mut open, &decoded);
            }
            Ok(Event::GeneralRef(ref e)) if in_text => {
                let resolved = match e.resolve_char_ref() {
                    Ok(Some(ch)) => Some(ch.to_string()),
                    _ => e.decode().ok().and_then(|name| {
                        quick_xml::escape::resolve_predefined_entity(&name).map(str::to_string)
                    }),
                };
                if let Some(text) = resolved {
                    push_run_text(&mut open, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProcessError::DecodeError(format!(
                    "XML error at byte {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

/// Text outside any paragraph is not body text and is dropped.
fn push_run_text(open: &mut [String], text: &str) {
    if let Some(current) = open.last_mut() {
        current.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;

    fn body(paragraphs: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="GBK" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{}</w:body></w:document>"#,
            paragraphs
        )
    }

    fn write_zip(entries: &[(&str, &str)]) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".docx").unwrap();
        {
            let mut zip = zip::ZipWriter::new(file.as_file_mut());
            for (name, content) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        file
    }

    #[test]
    fn test_runs_join_without_separator() {
        let xml = body(
            r#"<w:p><w:r><w:t>QN2026</w:t></w:r><w:r><w:t xml:space="preserve">0515 Quantum</w:t></w:r></w:p>
               <w:p><w:r><w:t>Balcony 4200 CNY</w:t></w:r></w:p>"#,
        );
        assert_eq!(
            parse_document_xml(&xml).unwrap(),
            "QN20260515 Quantum\nBalcony 4200 CNY"
        );
    }

    #[test]
    fn test_whitespace_only_paragraphs_dropped() {
        let xml = body(
            r#"<w:p><w:r><w:t>first</w:t></w:r></w:p>
               <w:p><w:r><w:t xml:space="preserve">   </w:t></w:r></w:p>
               <w:p/>
               <w:p><w:r><w:t>second</w:t></w:r></w:p>"#,
        );
        assert_eq!(parse_document_xml(&xml).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_entities_resolved() {
        let xml = body(r#"<w:p><w:r><w:t>P&amp;O &#38; Tokyo&#x2013;Osaka</w:t></w:r></w:p>"#);
        assert_eq!(parse_document_xml(&xml).unwrap(), "P&O & Tokyo–Osaka");
    }

    #[test]
    fn test_text_box_paragraph_keeps_outer_text() {
        let xml = body(
            r#"<w:p><w:r><w:t>QN20260515 Balcony 4200</w:t></w:r><w:r><w:pict><w:txbxContent>
               <w:p><w:r><w:t>Promo</w:t></w:r></w:p>
               </w:txbxContent></w:pict></w:r><w:r><w:t xml:space="preserve"> CNY</w:t></w:r></w:p>"#,
        );
        assert_eq!(
            parse_document_xml(&xml).unwrap(),
            "Promo\nQN20260515 Balcony 4200 CNY"
        );
    }

    #[test]
    fn test_malformed_xml_is_decode_error() {
        let xml = body(r#"<w:p><w:r><w:t>open</w:r></w:p>"#);
        assert!(matches!(
            parse_document_xml(&xml),
            Err(ProcessError::DecodeError(_))
        ));
    }

    #[test]
    fn test_extract_from_container() {
        let xml = body(r#"<w:p><w:r><w:t>阳台 4200</w:t></w:r></w:p>"#);
        let file = write_zip(&[("[Content_Types].xml", "<Types/>"), (DOCUMENT_PART, &xml)]);

        let text = DocxProcessor::new().extract(file.path()).unwrap();
        assert_eq!(text, "阳台 4200");
    }

    #[test]
    fn test_missing_document_part() {
        let file = write_zip(&[("word/styles.xml", "<w:styles/>")]);
        match DocxProcessor::new().extract(file.path()) {
            Err(ProcessError::MissingPart(part)) => assert_eq!(part, DOCUMENT_PART),
            other => panic!("Expected MissingPart, got {:?}", other),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let mut file = NamedTempFile::with_suffix(".docx").unwrap();
        file.write_all(b"plain bytes").unwrap();
        assert!(matches!(
            DocxProcessor::new().extract(file.path()),
            Err(ProcessError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_supports_office_only() {
        let processor = DocxProcessor::new();
        assert!(processor.supports(DocumentKind::Office));
        assert!(!processor.supports(DocumentKind::Pdf));
    }
}
