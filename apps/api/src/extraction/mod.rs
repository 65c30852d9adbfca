//! Document extraction: turns raw PDF / DOCX bytes into ordered, normalized text blocks
//! tagged with their source position.
//!
//! Extraction is synchronous and CPU-bound; the screening pool runs it on the blocking
//! thread pool with a per-document deadline.

pub mod docx;
pub mod normalize;
pub mod pdf;

use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Input
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Other(String),
}

impl DocumentFormat {
    /// Detects the format from the file extension, falling back to the declared MIME type.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("pdf") => return DocumentFormat::Pdf,
            Some("docx") => return DocumentFormat::Docx,
            _ => {}
        }

        match content_type.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            Some("application/pdf") => DocumentFormat::Pdf,
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
                DocumentFormat::Docx
            }
            _ => DocumentFormat::Other(ext.unwrap_or_else(|| "unknown".to_string())),
        }
    }
}

/// One uploaded resume. Bytes are reference-counted so batches can be cloned cheaply into workers.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub candidate_id: String,
    pub filename: String,
    pub format: DocumentFormat,
    pub bytes: Bytes,
}

impl ResumeDocument {
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: Bytes) -> Self {
        let filename = filename.into();
        Self {
            candidate_id: filename.clone(),
            format: DocumentFormat::detect(&filename, content_type),
            filename,
            bytes,
        }
    }

    pub fn with_candidate_id(mut self, candidate_id: impl Into<String>) -> Self {
        self.candidate_id = candidate_id.into();
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

/// 1-based page, 0-based paragraph index within the page. DOCX has no pages, so everything is page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub page: u32,
    pub paragraph: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Readable,
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub position: SourcePosition,
    pub status: BlockStatus,
}

/// Normalized text of a whole document, blocks in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub blocks: Vec<TextBlock>,
    pub page_count: u32,
}

impl NormalizedText {
    pub fn readable_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks
            .iter()
            .filter(|b| b.status == BlockStatus::Readable)
    }

    /// Pages that yielded no text at all.
    pub fn unreadable_pages(&self) -> Vec<u32> {
        self.blocks
            .iter()
            .filter(|b| b.status == BlockStatus::Unreadable)
            .map(|b| b.position.page)
            .collect()
    }

    pub fn is_unreadable(&self) -> bool {
        self.readable_blocks().next().is_none()
    }

    pub fn full_text(&self) -> String {
        self.readable_blocks()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported document format '{extension}' ({filename})")]
    UnsupportedFormat { filename: String, extension: String },

    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    #[error("extraction exceeded {0:?}")]
    ExtractionTimeout(Duration),
}

/// Extracts and normalizes one document. `deadline` is checked between pages.
pub fn extract(
    doc: &ResumeDocument,
    deadline: Option<Instant>,
) -> Result<NormalizedText, ExtractionError> {
    check_deadline(deadline, Instant::now())?;
    let text = match &doc.format {
        DocumentFormat::Pdf => pdf::extract_pdf(&doc.bytes, deadline)?,
        DocumentFormat::Docx => docx::extract_docx(&doc.bytes)?,
        DocumentFormat::Other(ext) => {
            return Err(ExtractionError::UnsupportedFormat {
                filename: doc.filename.clone(),
                extension: ext.clone(),
            });
        }
    };

    tracing::debug!(
        candidate_id = %doc.candidate_id,
        filename = %doc.filename,
        pages = text.page_count,
        blocks = text.blocks.len(),
        "Extracted document"
    );

    Ok(text)
}

pub(crate) fn check_deadline(
    deadline: Option<Instant>,
    started: Instant,
) -> Result<(), ExtractionError> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(ExtractionError::ExtractionTimeout(started.elapsed())),
        _ => Ok(()),
    }
}
