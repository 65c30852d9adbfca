//! DOCX text extraction: reads `word/document.xml` out of the OOXML zip container and walks
//! it with a streaming XML reader. Paragraphs become lines; tabs and breaks are preserved.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::extraction::normalize::blocks_for_page;
use crate::extraction::{ExtractionError, NormalizedText};

const DOCUMENT_PART: &str = "word/document.xml";

pub fn extract_docx(bytes: &[u8]) -> Result<NormalizedText, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::CorruptDocument(format!("failed to open DOCX: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::CorruptDocument(format!("missing {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::CorruptDocument(format!("unreadable {DOCUMENT_PART}: {e}")))?;

    let body = document_text(&xml)?;

    Ok(NormalizedText {
        blocks: blocks_for_page(1, &body),
        page_count: 1,
    })
}

/// Flattens WordprocessingML into plain text, one paragraph per line.
fn document_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|err| ExtractionError::CorruptDocument(format!("bad XML text: {err}")))?;
                    out.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::CorruptDocument(format!(
                    "malformed {DOCUMENT_PART} at {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
