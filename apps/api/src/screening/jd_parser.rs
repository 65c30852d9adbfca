//! JD Parser: extracts required / preferred skills, minimum experience and minimum education
//! from a free-text job description.
//!
//! Skills are found with the same vocabulary the resume side uses. Whether a skill is required
//! or preferred depends on the nearest cue phrase:
//! - a cue before the first skill of a sentence ("Required: Python, SQL") applies to the skills
//!   after it and carries into following sentences and lines;
//! - a cue after the first skill ("AWS is a plus") applies to the skills before it, within
//!   that sentence only;
//! - a carried cue ends at the next cue, at a header line with no cue, or at a blank line once
//!   it has been applied to at least one skill.
//!
//! Uncued skills are preferred with weight 1.0.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::extraction::normalize::normalize_line;
use crate::models::requirements::{JobRequirements, PreferredSkill, RequiredSkill};
use crate::profile::vocabulary::{tokenize, SkillEntry, SkillVocabulary};
use crate::profile::{education, experience};
use crate::screening::ScreeningError;

pub const STRONG_PREFERENCE_WEIGHT: f64 = 1.0;
pub const WEAK_PREFERENCE_WEIGHT: f64 = 0.5;

const MAX_HEADER_WORDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cue {
    Required,
    Preferred(f64),
}

static REQUIRED_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:required|requirements?|must[\s-]+haves?|mandatory|essential|(?:minimum|basic)\s+qualifications?)\b",
    )
    .unwrap()
});

static STRONG_PREFERENCE_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:preferred|preferably|desirable|desired|ideally)\b").unwrap()
});

static WEAK_PREFERENCE_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:nice[\s-]+to[\s-]+have|good[\s-]+to[\s-]+have|bonus|a\s+plus|plus)\b")
        .unwrap()
});

/// Cue phrases in `sentence` as `(start, end, cue)`, ordered by position.
fn find_cues(sentence: &str) -> Vec<(usize, usize, Cue)> {
    let mut cues: Vec<(usize, usize, Cue)> = Vec::new();
    let tables: [(&Regex, Cue); 3] = [
        (&*REQUIRED_CUE_RE, Cue::Required),
        (&*STRONG_PREFERENCE_CUE_RE, Cue::Preferred(STRONG_PREFERENCE_WEIGHT)),
        (&*WEAK_PREFERENCE_CUE_RE, Cue::Preferred(WEAK_PREFERENCE_WEIGHT)),
    ];
    for (re, cue) in tables {
        for m in re.find_iter(sentence) {
            // "a plus" and "plus" overlap; keep the first, longest hit.
            if cues.iter().any(|(s, e, _)| m.start() < *e && *s < m.end()) {
                continue;
            }
            cues.push((m.start(), m.end(), cue));
        }
    }
    cues.sort_by_key(|(s, _, _)| *s);
    cues
}

/// Splits on `.`, `;`, `!` or `?` followed by whitespace or end of line, so "Node.js" survives.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | ';' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, n)| n.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = line[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
        }
    }
    let rest = line[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

fn looks_like_header(sentence: &str) -> bool {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_HEADER_WORDS {
        return false;
    }
    sentence.trim_end().ends_with(':')
        || words
            .iter()
            .all(|w| w.chars().next().is_some_and(|c| !c.is_lowercase()))
}

/// Accumulates skills in order of first mention; required always wins over preferred.
#[derive(Default)]
struct RequirementBuilder {
    required: Vec<RequiredSkill>,
    preferred: Vec<PreferredSkill>,
}

impl RequirementBuilder {
    fn assign(&mut self, skill: &SkillEntry, cue: Cue) {
        let is_required = self.required.iter().any(|r| r.skill_id == skill.id);
        match cue {
            Cue::Required => {
                if is_required {
                    return;
                }
                self.preferred.retain(|p| p.skill_id != skill.id);
                self.required.push(RequiredSkill {
                    skill_id: skill.id.clone(),
                    name: skill.name.clone(),
                    category: skill.category.clone(),
                });
            }
            Cue::Preferred(weight) => {
                if is_required {
                    return;
                }
                match self.preferred.iter_mut().find(|p| p.skill_id == skill.id) {
                    Some(existing) => existing.weight = existing.weight.max(weight),
                    None => self.preferred.push(PreferredSkill {
                        skill_id: skill.id.clone(),
                        name: skill.name.clone(),
                        category: skill.category.clone(),
                        weight,
                    }),
                }
            }
        }
    }
}

/// Parses a job description into structured requirements.
pub fn parse_requirements(
    jd_text: &str,
    vocab: &SkillVocabulary,
) -> Result<JobRequirements, ScreeningError> {
    if jd_text.trim().is_empty() {
        return Err(ScreeningError::EmptyJobDescription);
    }

    let mut builder = RequirementBuilder::default();
    let mut carried: Option<Cue> = None;
    let mut carried_used = false;

    for raw_line in jd_text.lines() {
        let line = normalize_line(raw_line);
        if line.is_empty() {
            if carried_used {
                carried = None;
                carried_used = false;
            }
            continue;
        }

        for sentence in split_sentences(&line) {
            let cues = find_cues(sentence);
            let hits = vocab.find_with_list_items(sentence, &tokenize(sentence));

            if hits.is_empty() {
                if let Some((_, _, cue)) = cues.last() {
                    carried = Some(*cue);
                    carried_used = false;
                } else if looks_like_header(sentence) {
                    carried = None;
                    carried_used = false;
                }
                continue;
            }

            let first_skill = hits[0].start;
            let leading = cues.first().is_some_and(|(_, end, _)| *end <= first_skill);

            for hit in &hits {
                let before = cues.iter().rev().find(|(_, end, _)| *end <= hit.start).map(|c| c.2);
                let after = cues.iter().find(|(start, _, _)| *start >= hit.end).map(|c| c.2);

                let cue = if leading {
                    before
                } else {
                    after.or(before)
                };
                let cue = match (cue, carried) {
                    (Some(cue), _) => cue,
                    (None, Some(cue)) => {
                        carried_used = true;
                        cue
                    }
                    (None, None) => Cue::Preferred(STRONG_PREFERENCE_WEIGHT),
                };
                builder.assign(vocab.entry(hit.entry), cue);
            }

            if leading {
                if let Some((_, _, cue)) = cues.last() {
                    carried = Some(*cue);
                    carried_used = true;
                }
            }
        }
    }

    let requirements = JobRequirements {
        required_skills: builder.required,
        preferred_skills: builder.preferred,
        min_years_experience: experience::parse_years_mention(jd_text),
        min_education: education::minimum_level(jd_text),
    };

    if requirements.is_empty() {
        return Err(ScreeningError::EmptyJobDescription);
    }

    debug!(
        required = requirements.required_skills.len(),
        preferred = requirements.preferred_skills.len(),
        min_years = ?requirements.min_years_experience,
        min_education = ?requirements.min_education,
        "Parsed job requirements"
    );

    Ok(requirements)
}
