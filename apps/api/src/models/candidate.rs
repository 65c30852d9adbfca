use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::warnings::CandidateWarning;
use crate::profile::segmenter::SectionLabel;

/// Canonical skill identifier from the vocabulary (e.g. `python`, `nodejs`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Highest completed education, ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EducationLevel {
    #[default]
    None,
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl EducationLevel {
    /// Position on the ordered scale: NONE = 0 … DOCTORATE = 5.
    pub fn grade(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

/// Where a skill was found: section, source position and byte span inside the block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProvenance {
    pub section: SectionLabel,
    pub page: u32,
    pub paragraph: u32,
    pub start: usize,
    pub end: usize,
    pub surface: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkill {
    pub skill_id: SkillId,
    pub name: String,
    pub category: String,
    /// 1.0 for exact matches, the edit-distance ratio for fuzzy ones.
    pub confidence: f64,
    pub match_kind: MatchKind,
    pub provenance: SkillProvenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub characters: usize,
    pub words: usize,
}

/// Structured facts extracted from one resume. Built once by the profile pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate_id: String,
    /// Sorted by `skill_id`, one entry per canonical skill.
    pub skills: Vec<ExtractedSkill>,
    pub total_years_experience: Option<f64>,
    pub education_level: EducationLevel,
    pub job_titles: Vec<String>,
    /// Up to three lines that mention degrees or institutions.
    pub education_details: Vec<String>,
    pub text_stats: TextStats,
}

impl CandidateProfile {
    /// Profile with nothing extracted, used for unreadable documents.
    pub fn empty(candidate_id: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            skills: Vec::new(),
            total_years_experience: None,
            education_level: EducationLevel::None,
            job_titles: Vec::new(),
            education_details: Vec::new(),
            text_stats: TextStats::default(),
        }
    }

    pub fn skill(&self, id: &SkillId) -> Option<&ExtractedSkill> {
        self.skills
            .binary_search_by(|s| s.skill_id.cmp(id))
            .ok()
            .map(|i| &self.skills[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Parsed,
    Unreadable,
}

/// Output of the per-document pipeline: the profile plus everything that went wrong on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCandidate {
    pub profile: CandidateProfile,
    pub status: DocumentStatus,
    pub warnings: Vec<CandidateWarning>,
}

impl AnalyzedCandidate {
    pub fn unreadable(candidate_id: &str, warning: CandidateWarning) -> Self {
        Self {
            profile: CandidateProfile::empty(candidate_id),
            status: DocumentStatus::Unreadable,
            warnings: vec![warning],
        }
    }
}
