//! Skill extraction against the vocabulary.
//!
//! Exact matching runs over every section; SKILLS lists also accept short list-only forms
//! such as a bare "Go". Fuzzy matching (edit-distance ratio via
//! `rapidfuzz`) is limited to SKILLS and EXPERIENCE body lines to keep false positives down.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::extraction::{check_deadline, BlockStatus, ExtractionError};
use crate::models::candidate::{ExtractedSkill, MatchKind, SkillProvenance};
use crate::profile::segmenter::{SectionBlock, SectionLabel, SectionedResume};
use crate::profile::vocabulary::{tokenize, SkillVocabulary, Token, MIN_FUZZY_FORM_CHARS};

/// Words that sit within a couple of edits of a skill name but almost always mean something else.
const FUZZY_STOPWORDS: &[&str] = &[
    "angle", "chief", "docket", "expressed", "expresses", "expressly", "flash", "looked",
    "looks", "nodes", "pearl", "pearls", "peril", "reach", "reacted", "rusted", "rusty", "sails",
    "salad", "sale", "scalar", "scale", "scaled", "scales", "scaling", "scram", "scrub", "sells",
    "shall", "shelf", "shift", "space", "sparked", "sparkle", "sprint", "sprints", "string",
    "strings", "swiftly", "touch",
];

/// Maximum length difference (in chars) between a text n-gram and a surface form worth comparing.
const MAX_LENGTH_DELTA: usize = 2;

fn fuzzy_eligible(label: SectionLabel) -> bool {
    matches!(label, SectionLabel::Skills | SectionLabel::Experience)
}

/// Extracts skills from every readable block. Each canonical skill appears once, keeping the
/// highest-confidence occurrence (earliest in reading order on ties). Output is sorted by ID.
pub fn extract_skills(
    resume: &SectionedResume,
    vocab: &SkillVocabulary,
    fuzzy_threshold: f64,
    deadline: Option<Instant>,
) -> Result<Vec<ExtractedSkill>, ExtractionError> {
    let started = Instant::now();
    let mut best: BTreeMap<usize, ExtractedSkill> = BTreeMap::new();

    for (label, block) in resume.labeled_blocks() {
        if block.status != BlockStatus::Readable || block.text.is_empty() {
            continue;
        }
        check_deadline(deadline, started)?;

        let tokens = tokenize(&block.text);
        let hits = if label == SectionLabel::Skills {
            vocab.find_with_list_items(&block.text, &tokens)
        } else {
            vocab.find_exact_tokens(&tokens)
        };
        let mut covered = vec![false; tokens.len()];

        for hit in &hits {
            covered[hit.token_start..hit.token_end].fill(true);
            let candidate = build_skill(vocab, hit.entry, 1.0, MatchKind::Exact, label, block, hit.start, hit.end);
            keep_best(&mut best, hit.entry, candidate);
        }

        if fuzzy_eligible(label) && !block.is_header {
            for (entry, confidence, start, end) in fuzzy_hits(vocab, &tokens, &covered, fuzzy_threshold) {
                let candidate =
                    build_skill(vocab, entry, confidence, MatchKind::Fuzzy, label, block, start, end);
                keep_best(&mut best, entry, candidate);
            }
        }
    }

    let mut skills: Vec<ExtractedSkill> = best.into_values().collect();
    skills.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));
    Ok(skills)
}

fn keep_best(best: &mut BTreeMap<usize, ExtractedSkill>, entry: usize, candidate: ExtractedSkill) {
    match best.get(&entry) {
        Some(existing) if existing.confidence >= candidate.confidence => {}
        _ => {
            best.insert(entry, candidate);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_skill(
    vocab: &SkillVocabulary,
    entry: usize,
    confidence: f64,
    match_kind: MatchKind,
    section: SectionLabel,
    block: &SectionBlock,
    start: usize,
    end: usize,
) -> ExtractedSkill {
    let skill = vocab.entry(entry);
    ExtractedSkill {
        skill_id: skill.id.clone(),
        name: skill.name.clone(),
        category: skill.category.clone(),
        confidence,
        match_kind,
        provenance: SkillProvenance {
            section,
            page: block.position.page,
            paragraph: block.position.paragraph,
            start,
            end,
            surface: block.text[start..end].to_string(),
        },
    }
}

/// Compares every uncovered n-gram against same-length (in tokens) surface forms.
/// Returns `(entry, ratio, byte_start, byte_end)` for the best form per n-gram.
fn fuzzy_hits(
    vocab: &SkillVocabulary,
    tokens: &[Token],
    covered: &[bool],
    threshold: f64,
) -> Vec<(usize, f64, usize, usize)> {
    let mut out = Vec::new();

    for n in 1..=vocab.max_tokens() {
        if n > tokens.len() {
            break;
        }
        for i in 0..=tokens.len() - n {
            if covered[i..i + n].iter().any(|c| *c) {
                continue;
            }
            let phrase = tokens[i..i + n]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let char_count = phrase.chars().count();
            if char_count < MIN_FUZZY_FORM_CHARS || FUZZY_STOPWORDS.contains(&phrase.as_str()) {
                continue;
            }
            let Some(first) = phrase.chars().next() else {
                continue;
            };

            let mut best: Option<(usize, f64)> = None;
            for form in vocab.fuzzy_forms() {
                if form.token_count != n
                    || form.first != first
                    || form.char_count.abs_diff(char_count) > MAX_LENGTH_DELTA
                {
                    continue;
                }
                let ratio = rapidfuzz::fuzz::ratio(phrase.chars(), form.form.chars());
                if ratio >= threshold && ratio < 1.0 && best.map_or(true, |(_, r)| ratio > r) {
                    best = Some((form.entry, ratio));
                }
            }

            if let Some((entry, ratio)) = best {
                out.push((entry, ratio, tokens[i].start, tokens[i + n - 1].end));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::normalize::blocks_for_page;
    use crate::extraction::NormalizedText;
    use crate::profile::segmenter::segment;

    fn resume(lines: &[&str]) -> SectionedResume {
        segment(&NormalizedText {
            blocks: blocks_for_page(1, &lines.join("\n")),
            page_count: 1,
        })
    }

    fn ids(skills: &[ExtractedSkill]) -> Vec<&str> {
        skills.iter().map(|s| s.skill_id.as_str()).collect()
    }

    #[test]
    fn test_exact_matches_are_sorted_and_deduplicated() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Jane Doe", "Skills", "Python, SQL, python3, Docker"]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();

        assert_eq!(ids(&skills), vec!["docker", "python", "sql"]);
        let python = &skills[1];
        assert_eq!(python.confidence, 1.0);
        assert_eq!(python.match_kind, MatchKind::Exact);
        assert_eq!(python.provenance.section, SectionLabel::Skills);
        assert_eq!(python.provenance.surface, "Python");
    }

    #[test]
    fn test_fuzzy_match_in_skills_section() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Skills", "Kubernets, Postgresql"]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();

        let k8s = skills.iter().find(|s| s.skill_id.as_str() == "kubernetes").unwrap();
        assert_eq!(k8s.match_kind, MatchKind::Fuzzy);
        assert!(k8s.confidence >= 0.8 && k8s.confidence < 1.0);
        assert_eq!(k8s.provenance.surface, "Kubernets");
    }

    #[test]
    fn test_bare_list_form_only_in_skills_section() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Skills", "Java, Go, R", "Experience", "Had to go live in R&D"]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();

        assert_eq!(ids(&skills), vec!["go", "java", "r"]);
        let go = skills.iter().find(|s| s.skill_id.as_str() == "go").unwrap();
        assert_eq!(go.match_kind, MatchKind::Exact);
        assert_eq!(go.provenance.section, SectionLabel::Skills);
        assert_eq!(go.provenance.surface, "Go");

        let r = resume(&["Summary", "Java, Go"]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();
        assert_eq!(ids(&skills), vec!["java"]);
    }

    #[test]
    fn test_no_fuzzy_outside_skills_and_experience() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Summary", "Kubernets enthusiast", "Skills", "Rust"]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();
        assert_eq!(ids(&skills), vec!["rust"]);
    }

    #[test]
    fn test_everyday_words_near_skill_names_are_not_fuzzy_matched() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&[
            "Experience",
            "Drove sprint planning",
            "Ran two-week sprints and sales reviews across worker nodes",
        ]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();
        assert!(skills.iter().all(|s| s.match_kind == MatchKind::Exact));
        assert!(!ids(&skills).contains(&"spring"));
        assert!(!ids(&skills).contains(&"nodejs"));

        let r = resume(&["Experience", "Drove sprint planning"]);
        assert!(extract_skills(&r, &vocab, 0.8, None).unwrap().is_empty());
    }

    #[test]
    fn test_higher_threshold_discards_fuzzy() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Skills", "Kubernets"]);
        let skills = extract_skills(&r, &vocab, 0.99, None).unwrap();
        assert!(skills.is_empty());
    }

    #[test]
    fn test_exact_beats_earlier_fuzzy() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Skills", "Kubernets", "Experience", "Ran Kubernetes clusters"]);
        let skills = extract_skills(&r, &vocab, 0.8, None).unwrap();
        let k8s = skills.iter().find(|s| s.skill_id.as_str() == "kubernetes").unwrap();
        assert_eq!(k8s.match_kind, MatchKind::Exact);
        assert_eq!(k8s.provenance.section, SectionLabel::Experience);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let vocab = SkillVocabulary::builtin();
        let r = resume(&["Skills", "Rust"]);
        let err = extract_skills(&r, &vocab, 0.8, Some(Instant::now())).unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionTimeout(_)));
    }
}
