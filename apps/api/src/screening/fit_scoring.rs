//! Fit Scoring: measures one candidate profile against parsed job requirements.
//!
//! Skill matching is by canonical ID first; when a requested skill has no exact match the
//! similarity backend is asked for the closest candidate skill. Experience and education are
//! pure arithmetic. The composite is a weighted sum of the three sub-scores.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::config::ScreeningConfig;
use crate::models::candidate::{AnalyzedCandidate, CandidateProfile, EducationLevel, SkillId};
use crate::models::ranking::{ScoredCandidate, SubScores};
use crate::models::requirements::JobRequirements;
use crate::models::warnings::{CandidateWarning, Stage, WarningKind};
use crate::similarity::SimilarityScorer;

const REQUIRED_SKILL_WEIGHT: f64 = 2.0;
const NO_YEARS_EXPERIENCE_SCORE: f64 = 50.0;

// ────────────────────────────────────────────────────────────────────────────
// Skill matching
// ────────────────────────────────────────────────────────────────────────────

/// A requested skill, flattened from either requirement list.
struct RequestedSkill<'a> {
    skill_id: &'a SkillId,
    name: &'a str,
    category: &'a str,
    weight: f64,
    required: bool,
}

fn requested_skills(reqs: &JobRequirements) -> Vec<RequestedSkill<'_>> {
    let required = reqs.required_skills.iter().map(|s| RequestedSkill {
        skill_id: &s.skill_id,
        name: &s.name,
        category: &s.category,
        weight: REQUIRED_SKILL_WEIGHT,
        required: true,
    });
    let preferred = reqs.preferred_skills.iter().map(|s| RequestedSkill {
        skill_id: &s.skill_id,
        name: &s.name,
        category: &s.category,
        weight: s.weight,
        required: false,
    });
    required.chain(preferred).collect()
}

/// Scores candidates against one set of requirements. Cheap to clone; one per batch.
#[derive(Clone)]
pub struct FitScorer {
    similarity: Arc<dyn SimilarityScorer>,
}

impl FitScorer {
    pub fn new(similarity: Arc<dyn SimilarityScorer>) -> Self {
        Self { similarity }
    }

    /// Produces the result row for one analyzed candidate. `rank` is left at 0.
    /// Unreadable candidates carry an empty profile and are scored like any other.
    pub async fn score(
        &self,
        candidate: AnalyzedCandidate,
        reqs: &JobRequirements,
        config: &ScreeningConfig,
    ) -> ScoredCandidate {
        let AnalyzedCandidate {
            profile,
            status,
            mut warnings,
        } = candidate;

        let skill_match = self
            .match_skills(&profile, reqs, config, &mut warnings)
            .await;

        let skills = skill_match.score(config.missing_required_penalty);
        let experience = experience_score(profile.total_years_experience, reqs.min_years_experience);
        let education = education_score(
            profile.education_level,
            reqs.min_education,
            config.education_grade_step,
        );
        let composite_score = composite(skills, experience, education, config);
        let category_coverage = skill_match.coverage();

        ScoredCandidate {
            candidate_id: profile.candidate_id,
            rank: 0,
            status,
            composite_score,
            sub_scores: SubScores {
                skills: round2(skills),
                experience: round2(experience),
                education: round2(education),
            },
            matched_required_skills: skill_match.matched_required,
            missing_required_skills: skill_match.missing_required,
            matched_preferred_skills: skill_match.matched_preferred,
            category_coverage,
            warnings,
        }
    }

    async fn match_skills(
        &self,
        profile: &CandidateProfile,
        reqs: &JobRequirements,
        config: &ScreeningConfig,
        warnings: &mut Vec<CandidateWarning>,
    ) -> SkillMatch {
        let mut result = SkillMatch::default();
        let mut similarity_available = true;

        for requested in requested_skills(reqs) {
            let mut confidence = profile.skill(requested.skill_id).map(|s| s.confidence);

            if confidence.is_none() && similarity_available {
                match self.best_related(profile, requested.name, config).await {
                    Ok(related) => confidence = related,
                    Err(message) => {
                        warn!(
                            candidate_id = %profile.candidate_id,
                            backend = self.similarity.backend(),
                            "Similarity unavailable, falling back to exact matching: {}",
                            message
                        );
                        warnings.push(CandidateWarning::new(
                            Stage::Scoring,
                            WarningKind::SimilarityUnavailable,
                            format!("related-skill matching disabled: {message}"),
                        ));
                        similarity_available = false;
                    }
                }
            }

            result.record(&requested, confidence);
        }

        result
    }

    /// Best related candidate skill for `requested_name`, as `similarity × confidence`,
    /// when the similarity clears the threshold. The first candidate skill wins ties.
    async fn best_related(
        &self,
        profile: &CandidateProfile,
        requested_name: &str,
        config: &ScreeningConfig,
    ) -> Result<Option<f64>, String> {
        let mut best: Option<(f64, f64)> = None;
        for skill in &profile.skills {
            let similarity = self
                .similarity
                .similarity(requested_name, &skill.name)
                .await
                .map_err(|e| e.to_string())?;
            if similarity < config.fuzzy_match_threshold {
                continue;
            }
            if best.map_or(true, |(s, _)| similarity > s) {
                best = Some((similarity, similarity * skill.confidence));
            }
        }
        Ok(best.map(|(_, confidence)| confidence))
    }
}

#[derive(Default)]
struct SkillMatch {
    earned: f64,
    possible: f64,
    matched_required: Vec<String>,
    missing_required: Vec<String>,
    matched_preferred: Vec<String>,
    /// category → (matched, requested)
    categories: BTreeMap<String, (usize, usize)>,
}

impl SkillMatch {
    fn record(&mut self, requested: &RequestedSkill<'_>, confidence: Option<f64>) {
        self.possible += requested.weight;
        let counts = self
            .categories
            .entry(requested.category.to_string())
            .or_insert((0, 0));
        counts.1 += 1;

        match confidence {
            Some(confidence) => {
                self.earned += requested.weight * confidence;
                counts.0 += 1;
                if requested.required {
                    self.matched_required.push(requested.name.to_string());
                } else {
                    self.matched_preferred.push(requested.name.to_string());
                }
            }
            None if requested.required => self.missing_required.push(requested.name.to_string()),
            None => {}
        }
    }

    fn score(&self, missing_required_penalty: f64) -> f64 {
        if self.possible <= 0.0 {
            return 100.0;
        }
        let raw = (self.earned / self.possible * 100.0).min(100.0);
        if self.missing_required.is_empty() {
            raw
        } else {
            raw * missing_required_penalty
        }
    }

    fn coverage(&self) -> BTreeMap<String, f64> {
        self.categories
            .iter()
            .map(|(category, (matched, requested))| {
                (
                    category.clone(),
                    round2(*matched as f64 / *requested as f64 * 100.0),
                )
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Experience, education, composite
// ────────────────────────────────────────────────────────────────────────────

pub fn experience_score(years: Option<f64>, min_years: Option<f64>) -> f64 {
    match (min_years, years) {
        (None, _) => 100.0,
        (Some(_), None) => NO_YEARS_EXPERIENCE_SCORE,
        (Some(min), Some(years)) => (100.0 * years / min.max(1.0)).clamp(0.0, 100.0),
    }
}

pub fn education_score(
    level: EducationLevel,
    min_level: Option<EducationLevel>,
    grade_step: f64,
) -> f64 {
    match min_level {
        Some(min) if level < min => {
            let short = f64::from(min.grade() - level.grade());
            (100.0 - grade_step * short).max(0.0)
        }
        _ => 100.0,
    }
}

pub fn composite(skills: f64, experience: f64, education: f64, config: &ScreeningConfig) -> u32 {
    let w = &config.factor_weights;
    let weighted = (w.skills * skills + w.experience * experience + w.education * education) / 100.0;
    weighted.round().clamp(0.0, 100.0) as u32
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
