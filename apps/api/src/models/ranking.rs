use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::candidate::DocumentStatus;
use crate::models::warnings::CandidateWarning;

/// Per-factor scores, each on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
}

/// One result row. `rank` is 0 until the ranker assigns positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate_id: String,
    pub rank: usize,
    pub status: DocumentStatus,
    pub composite_score: u32,
    pub sub_scores: SubScores,
    pub matched_required_skills: Vec<String>,
    pub missing_required_skills: Vec<String>,
    pub matched_preferred_skills: Vec<String>,
    /// Share of requested skills matched per vocabulary category (0–100).
    pub category_coverage: BTreeMap<String, f64>,
    pub warnings: Vec<CandidateWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    pub candidates: Vec<ScoredCandidate>,
}

impl RankedList {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidate_ids(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .map(|c| c.candidate_id.as_str())
            .collect()
    }
}
