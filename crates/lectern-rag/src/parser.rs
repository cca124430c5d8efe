//! Text extraction from uploaded documents.
//!
//! Dispatch is by file suffix, case-insensitive. PDF goes through
//! `pdf-extract`; DOCX is unzipped and the `w:t` runs of
//! `word/document.xml` are collected, one line per `w:p` paragraph; plain
//! text and Markdown are decoded as UTF-8 with invalid bytes replaced.

use std::io::Read;

use quick_xml::events::Event;

use crate::error::{RagError, Result};

/// Cap on decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract plain text from an uploaded document.
///
/// Fails with [`RagError::UnsupportedFormat`] for unknown suffixes and
/// [`RagError::EmptyDocument`] when extraction produced nothing but
/// whitespace. Malformed PDF/DOCX bytes surface as recoverable
/// [`RagError::Parse`] errors.
pub fn parse_document(filename: &str, bytes: &[u8]) -> Result<String> {
    let suffix = filename
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = match suffix.as_str() {
        "pdf" => parse_pdf(filename, bytes)?,
        "docx" => parse_docx(filename, bytes)?,
        "txt" | "md" => String::from_utf8_lossy(bytes).into_owned(),
        _ => return Err(RagError::UnsupportedFormat(filename.to_string())),
    };

    if text.trim().is_empty() {
        tracing::warn!(filename, "Document contained no extractable text");
        return Err(RagError::EmptyDocument(filename.to_string()));
    }

    Ok(text)
}

fn parse_pdf(filename: &str, bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| RagError::Parse {
        filename: filename.to_string(),
        message: e.to_string(),
    })
}

fn parse_docx(filename: &str, bytes: &[u8]) -> Result<String> {
    let parse_err = |message: String| RagError::Parse {
        filename: filename.to_string(),
        message,
    };

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| parse_err(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| parse_err("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| parse_err(e.to_string()))?;
    }

    extract_paragraphs(&doc_xml).map_err(parse_err)
}

/// Walk the document XML collecting `w:t` text runs, joining paragraphs
/// (`w:p` elements) with newlines.
fn extract_paragraphs(xml: &[u8]) -> std::result::Result<String, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                current.push_str(t.unescape().map_err(|e| e.to_string())?.as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                b"t" => in_text_run = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body_xml: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}</w:body></w:document>"#
        );
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(document.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_txt_and_md_decode_lossy() {
        let text = parse_document("notes.txt", b"plain text").unwrap();
        assert_eq!(text, "plain text");

        let text = parse_document("README.MD", b"# heading").unwrap();
        assert_eq!(text, "# heading");

        // Invalid UTF-8 is replaced, not rejected.
        let text = parse_document("data.txt", &[b'o', b'k', 0xff, b'!']).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn test_unknown_suffix_rejected() {
        let err = parse_document("image.png", b"\x89PNG").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_empty_text_file_rejected() {
        let err = parse_document("empty.txt", b"   \n ").unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument(_)));
    }

    #[test]
    fn test_malformed_pdf_is_recoverable() {
        let err = parse_document("broken.pdf", b"not a pdf at all").unwrap_err();
        assert!(matches!(err, RagError::Parse { .. }));
    }

    #[test]
    fn test_malformed_docx_is_recoverable() {
        let err = parse_document("broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, RagError::Parse { .. }));
    }

    #[test]
    fn test_docx_paragraphs_join_with_newlines() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>first paragraph</w:t></w:r></w:p>\
             <w:p><w:r><w:t>second </w:t></w:r><w:r><w:t>paragraph</w:t></w:r></w:p>",
        );
        let text = parse_document("doc.docx", &bytes).unwrap();
        assert_eq!(text, "first paragraph\nsecond paragraph");
    }

    #[test]
    fn test_docx_without_text_rejected() {
        let bytes = docx_with_body("<w:p></w:p>");
        let err = parse_document("empty.docx", &bytes).unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument(_)));
    }

    #[test]
    fn test_suffix_dispatch_is_case_insensitive() {
        let err = parse_document("REPORT.PDF", b"junk").unwrap_err();
        assert!(matches!(err, RagError::Parse { .. }));
    }
}
