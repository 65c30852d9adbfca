// Candidate profile building: segmentation, skill / experience / education extraction.
// Everything here is synchronous and pure; the screening pool runs it on blocking threads.

pub mod education;
pub mod experience;
pub mod segmenter;
pub mod skills;
pub mod vocabulary;

use std::time::Instant;

use chrono::NaiveDate;
use tracing::debug;

use crate::extraction::{self, ExtractionError, NormalizedText, ResumeDocument};
use crate::models::candidate::{
    AnalyzedCandidate, CandidateProfile, DocumentStatus, EducationLevel, TextStats,
};
use crate::models::warnings::{CandidateWarning, Stage, WarningKind};
use crate::profile::experience::RangeIssue;
use crate::profile::segmenter::{SectionLabel, SectionedResume};
use crate::profile::vocabulary::SkillVocabulary;

/// Knobs for one profile build.
#[derive(Debug, Clone, Copy)]
pub struct ProfileOptions {
    pub fuzzy_match_threshold: f64,
    /// Date "Present" resolves to.
    pub as_of: NaiveDate,
    /// Hard stop for extraction and fuzzy matching.
    pub deadline: Option<Instant>,
}

/// Full per-document pipeline: extract → segment → build profile. Never fails; every problem
/// becomes a warning and, when nothing usable remains, an UNREADABLE status.
pub fn analyze(
    doc: &ResumeDocument,
    vocab: &SkillVocabulary,
    options: &ProfileOptions,
) -> AnalyzedCandidate {
    let text = match extraction::extract(doc, options.deadline) {
        Ok(text) => text,
        Err(e) => {
            return AnalyzedCandidate::unreadable(
                &doc.candidate_id,
                extraction_warning(Stage::Extraction, &e),
            )
        }
    };

    if text.is_unreadable() {
        return AnalyzedCandidate::unreadable(
            &doc.candidate_id,
            CandidateWarning::new(
                Stage::Extraction,
                WarningKind::UnreadableDocument,
                "no extractable text in document",
            ),
        );
    }

    let mut warnings: Vec<CandidateWarning> = text
        .unreadable_pages()
        .into_iter()
        .map(|page| {
            CandidateWarning::new(
                Stage::Extraction,
                WarningKind::UnreadablePage,
                format!("page {page} has no extractable text"),
            )
        })
        .collect();

    let sectioned = segmenter::segment(&text);

    match build_profile(&doc.candidate_id, &text, &sectioned, vocab, options) {
        Ok((profile, mut profile_warnings)) => {
            warnings.append(&mut profile_warnings);
            debug!(
                candidate_id = %doc.candidate_id,
                skills = profile.skills.len(),
                years = ?profile.total_years_experience,
                "Built candidate profile"
            );
            AnalyzedCandidate {
                profile,
                status: DocumentStatus::Parsed,
                warnings,
            }
        }
        Err(e) => {
            warnings.push(extraction_warning(Stage::Skills, &e));
            AnalyzedCandidate {
                profile: CandidateProfile::empty(&doc.candidate_id),
                status: DocumentStatus::Unreadable,
                warnings,
            }
        }
    }
}

pub fn extraction_warning(stage: Stage, err: &ExtractionError) -> CandidateWarning {
    let kind = match err {
        ExtractionError::UnsupportedFormat { .. } => WarningKind::UnsupportedFormat,
        ExtractionError::CorruptDocument(_) => WarningKind::CorruptDocument,
        ExtractionError::ExtractionTimeout(_) => WarningKind::ExtractionTimeout,
    };
    CandidateWarning::new(stage, kind, err.to_string())
}

/// Builds the structured profile from segmented text. Only a deadline overrun is an error;
/// unparseable fields come back as null plus a warning.
pub fn build_profile(
    candidate_id: &str,
    text: &NormalizedText,
    sectioned: &SectionedResume,
    vocab: &SkillVocabulary,
    options: &ProfileOptions,
) -> Result<(CandidateProfile, Vec<CandidateWarning>), ExtractionError> {
    let mut warnings = Vec::new();

    if !sectioned.headers_detected {
        warnings.push(CandidateWarning::new(
            Stage::Segmentation,
            WarningKind::NoSectionHeaders,
            "no section headers recognized; all text treated as OTHER",
        ));
    }

    let skills = skills::extract_skills(
        sectioned,
        vocab,
        options.fuzzy_match_threshold,
        options.deadline,
    )?;

    // Experience: EXPERIENCE section when present, otherwise everything except EDUCATION.
    let experience_lines: Vec<&str> = if sectioned.has_section(SectionLabel::Experience) {
        body_lines(sectioned, |label| label == SectionLabel::Experience)
    } else {
        body_lines(sectioned, |label| label != SectionLabel::Education)
    };
    let experience_text = experience_lines.join("\n");

    let (ranges, issues) = experience::parse_date_ranges(&experience_text, options.as_of);
    for issue in issues {
        let message = match issue {
            RangeIssue::Inverted(raw) => format!("date range '{raw}' ends before it starts"),
            RangeIssue::StartsAfterAsOf(raw) => format!("date range '{raw}' starts in the future"),
        };
        warnings.push(CandidateWarning::new(
            Stage::Experience,
            WarningKind::InvalidDateRange,
            message,
        ));
    }

    let total_years_experience = if ranges.is_empty() {
        experience::parse_years_statement(&text.full_text())
    } else {
        Some(experience::months_to_years(experience::union_months(
            &ranges,
        )))
    };
    if total_years_experience.is_none() {
        warnings.push(CandidateWarning::new(
            Stage::Experience,
            WarningKind::ExperienceUnparsed,
            "no date ranges or experience statements found",
        ));
    }

    let job_titles = if sectioned.has_section(SectionLabel::Experience) {
        experience::extract_titles(experience_lines.iter().copied())
    } else {
        Vec::new()
    };

    // Education: EDUCATION section when present, otherwise every block.
    let education_lines: Vec<&str> = if sectioned.has_section(SectionLabel::Education) {
        body_lines(sectioned, |label| label == SectionLabel::Education)
    } else {
        body_lines(sectioned, |_| true)
    };
    let education_level = education::highest_level(education_lines.iter().copied());
    if education_level == EducationLevel::None && sectioned.has_section(SectionLabel::Education) {
        warnings.push(CandidateWarning::new(
            Stage::Education,
            WarningKind::EducationUnparsed,
            "education section present but no degree level recognized",
        ));
    }
    let education_details = education::detail_lines(education_lines.iter().copied());

    let full = text.full_text();
    let text_stats = TextStats {
        characters: full.chars().count(),
        words: full.split_whitespace().count(),
    };

    let profile = CandidateProfile {
        candidate_id: candidate_id.to_string(),
        skills,
        total_years_experience,
        education_level,
        job_titles,
        education_details,
        text_stats,
    };

    Ok((profile, warnings))
}

/// Non-header, non-empty block texts of the sections accepted by `keep`, in reading order.
fn body_lines(sectioned: &SectionedResume, keep: impl Fn(SectionLabel) -> bool) -> Vec<&str> {
    sectioned
        .labeled_blocks()
        .into_iter()
        .filter(|(label, block)| keep(*label) && !block.is_header && !block.text.is_empty())
        .map(|(_, block)| block.text.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::docx::tests::build_docx;
    use bytes::Bytes;

    fn options() -> ProfileOptions {
        ProfileOptions {
            fuzzy_match_threshold: 0.8,
            as_of: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            deadline: None,
        }
    }

    fn docx(name: &str, paragraphs: &[&str]) -> ResumeDocument {
        ResumeDocument::new(name, None, Bytes::from(build_docx(paragraphs)))
    }

    #[test]
    fn test_full_profile_from_docx() {
        let vocab = SkillVocabulary::builtin();
        let doc = docx(
            "jane.docx",
            &[
                "Jane Doe",
                "jane@example.com",
                "Skills",
                "Python, SQL, AWS",
                "Experience",
                "Backend Engineer | Acme | Jan 2019 - Jan 2021",
                "Senior Backend Engineer | Globex | Jun 2020 - Jun 2022",
                "Education",
                "Bachelor of Science, Computer Science, State University",
            ],
        );

        let analyzed = analyze(&doc, &vocab, &options());
        assert_eq!(analyzed.status, DocumentStatus::Parsed);
        assert!(analyzed.warnings.is_empty(), "{:?}", analyzed.warnings);

        let p = &analyzed.profile;
        let ids: Vec<&str> = p.skills.iter().map(|s| s.skill_id.as_str()).collect();
        assert_eq!(ids, vec!["aws", "python", "sql"]);
        assert!((p.total_years_experience.unwrap() - 3.42).abs() < 0.01);
        assert_eq!(p.education_level, EducationLevel::Bachelor);
        assert_eq!(
            p.job_titles,
            vec!["Backend Engineer".to_string(), "Senior Backend Engineer".to_string()]
        );
        assert_eq!(p.education_details.len(), 1);
        assert!(p.text_stats.words > 10);
    }

    #[test]
    fn test_no_headers_degrades_gracefully() {
        let vocab = SkillVocabulary::builtin();
        let doc = docx(
            "plain.docx",
            &["John Smith", "Python developer with 4 years of experience", "BSc in Physics"],
        );

        let analyzed = analyze(&doc, &vocab, &options());
        assert_eq!(analyzed.status, DocumentStatus::Parsed);
        assert!(analyzed
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::NoSectionHeaders));
        assert_eq!(analyzed.profile.total_years_experience, Some(4.0));
        assert_eq!(analyzed.profile.education_level, EducationLevel::Bachelor);
        assert_eq!(analyzed.profile.skills[0].skill_id.as_str(), "python");
    }

    #[test]
    fn test_inverted_range_warns_and_continues() {
        let vocab = SkillVocabulary::builtin();
        let doc = docx(
            "inv.docx",
            &["Experience", "Analyst, Jun 2021 - Jan 2019", "Engineer, 2015 - 2017"],
        );
        let analyzed = analyze(&doc, &vocab, &options());
        assert!(analyzed
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::InvalidDateRange && w.stage == Stage::Experience));
        assert_eq!(analyzed.profile.total_years_experience, Some(2.0));
    }

    #[test]
    fn test_unrecognized_education_section_warns() {
        let vocab = SkillVocabulary::builtin();
        let doc = docx(
            "edu.docx",
            &["Experience", "Engineer, 2015 - 2017", "Education", "Coursera, various courses"],
        );
        let analyzed = analyze(&doc, &vocab, &options());
        assert_eq!(analyzed.status, DocumentStatus::Parsed);
        assert_eq!(analyzed.profile.education_level, EducationLevel::None);
        let education: Vec<_> = analyzed
            .warnings
            .iter()
            .filter(|w| w.stage == Stage::Education)
            .collect();
        assert_eq!(education.len(), 1);
        assert_eq!(education[0].kind, WarningKind::EducationUnparsed);

        // No EDUCATION section at all is not worth a warning.
        let doc = docx("noedu.docx", &["Experience", "Engineer, 2015 - 2017"]);
        let analyzed = analyze(&doc, &vocab, &options());
        assert!(analyzed.warnings.iter().all(|w| w.stage != Stage::Education));
    }

    #[test]
    fn test_corrupt_document_is_unreadable() {
        let vocab = SkillVocabulary::builtin();
        let doc = ResumeDocument::new("broken.docx", None, Bytes::from_static(b"garbage"));
        let analyzed = analyze(&doc, &vocab, &options());
        assert_eq!(analyzed.status, DocumentStatus::Unreadable);
        assert_eq!(analyzed.warnings[0].kind, WarningKind::CorruptDocument);
        assert!(analyzed.profile.skills.is_empty());
    }

    #[test]
    fn test_empty_document_is_unreadable() {
        let vocab = SkillVocabulary::builtin();
        let doc = docx("empty.docx", &["", ""]);
        let analyzed = analyze(&doc, &vocab, &options());
        assert_eq!(analyzed.status, DocumentStatus::Unreadable);
        assert_eq!(analyzed.warnings[0].kind, WarningKind::UnreadableDocument);
    }
}
