use serde::{Deserialize, Serialize};

/// Pipeline stage a per-candidate problem was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Segmentation,
    Skills,
    Experience,
    Education,
    Scoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnsupportedFormat,
    CorruptDocument,
    ExtractionTimeout,
    UnreadablePage,
    UnreadableDocument,
    NoSectionHeaders,
    InvalidDateRange,
    ExperienceUnparsed,
    EducationUnparsed,
    SimilarityUnavailable,
    WorkerFailed,
}

/// A non-fatal problem attached to one candidate's result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateWarning {
    pub stage: Stage,
    pub kind: WarningKind,
    pub message: String,
}

impl CandidateWarning {
    pub fn new(stage: Stage, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}
