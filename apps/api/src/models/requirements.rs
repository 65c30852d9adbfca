use serde::{Deserialize, Serialize};

use crate::models::candidate::{EducationLevel, SkillId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub skill_id: SkillId,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredSkill {
    pub skill_id: SkillId,
    pub name: String,
    pub category: String,
    pub weight: f64,
}

/// Structured requirements parsed from a job description.
/// Skill lists hold unique IDs in order of first mention; a skill is never in both lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequirements {
    pub required_skills: Vec<RequiredSkill>,
    pub preferred_skills: Vec<PreferredSkill>,
    pub min_years_experience: Option<f64>,
    pub min_education: Option<EducationLevel>,
}

impl JobRequirements {
    pub fn is_empty(&self) -> bool {
        self.required_skills.is_empty()
            && self.preferred_skills.is_empty()
            && self.min_years_experience.is_none()
            && self.min_education.is_none()
    }
}
