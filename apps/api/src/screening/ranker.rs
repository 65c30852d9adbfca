//! Ranker: orders the complete result set and assigns 1-based ranks.

use std::cmp::Ordering;

use crate::models::ranking::{RankedList, ScoredCandidate};

/// Composite descending, then matched required skill count descending, then candidate ID
/// ascending. Candidate IDs are unique within a batch, so the order is total.
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.composite_score
        .cmp(&a.composite_score)
        .then_with(|| {
            b.matched_required_skills
                .len()
                .cmp(&a.matched_required_skills.len())
        })
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

pub fn rank(mut candidates: Vec<ScoredCandidate>) -> RankedList {
    candidates.sort_by(compare);
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = i + 1;
    }
    RankedList { candidates }
}
