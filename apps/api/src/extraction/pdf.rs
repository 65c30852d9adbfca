//! PDF text extraction. Per-page extraction via `lopdf`, with `pdf-extract` as a whole-document
//! fallback when lopdf cannot read any page.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use lopdf::Document;
use tracing::{debug, warn};

use crate::extraction::normalize::{blocks_for_page, unreadable_page};
use crate::extraction::{check_deadline, ExtractionError, NormalizedText};

const MAGIC_WINDOW: usize = 1024;

pub fn extract_pdf(bytes: &[u8], deadline: Option<Instant>) -> Result<NormalizedText, ExtractionError> {
    let started = Instant::now();

    if !has_pdf_magic(bytes) {
        return Err(ExtractionError::CorruptDocument(
            "missing %PDF- header".to_string(),
        ));
    }

    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractionError::CorruptDocument(format!("failed to parse PDF: {e}")))?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ExtractionError::CorruptDocument(
            "encrypted PDF".to_string(),
        ));
    }

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ExtractionError::CorruptDocument("PDF has no pages".to_string()));
    }

    let page_count = pages.len() as u32;
    let mut blocks = Vec::new();
    let mut failed_pages = 0u32;

    for (page_num, _page_id) in pages {
        check_deadline(deadline, started)?;
        match doc.extract_text(&[page_num]) {
            Ok(text) => blocks.extend(blocks_for_page(page_num, &text)),
            Err(e) => {
                debug!("lopdf could not read page {page_num}: {e}");
                failed_pages += 1;
                blocks.push(unreadable_page(page_num));
            }
        }
    }

    let mut text = NormalizedText { blocks, page_count };

    if failed_pages == page_count {
        check_deadline(deadline, started)?;
        if let Some(fallback) = fallback_extract(bytes, page_count) {
            text = fallback;
        }
    }

    Ok(text)
}

fn has_pdf_magic(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(MAGIC_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Whole-document extraction through `pdf-extract`. The crate can panic on malformed
/// input, so the call is isolated; any failure just means "no better text available".
fn fallback_extract(bytes: &[u8], page_count: u32) -> Option<NormalizedText> {
    let result = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));

    let raw = match result {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!("pdf-extract fallback failed: {e}");
            return None;
        }
        Err(_) => {
            warn!("pdf-extract fallback panicked");
            return None;
        }
    };

    let text = NormalizedText {
        blocks: blocks_for_page(1, &raw.replace('\x0c', "\n")),
        page_count,
    };
    if text.is_unreadable() {
        None
    } else {
        Some(text)
    }
}
