//! Section segmentation: labels every text block with the resume section it belongs to by
//! recognizing header lines against keyword lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extraction::{BlockStatus, NormalizedText, SourcePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionLabel {
    Contact,
    Summary,
    Skills,
    Experience,
    Education,
    Other,
}

const CONTACT_HEADERS: &[&str] = &[
    "contact",
    "contact information",
    "contact info",
    "contact details",
    "personal information",
    "personal details",
];

const SUMMARY_HEADERS: &[&str] = &[
    "summary",
    "professional summary",
    "career summary",
    "executive summary",
    "profile",
    "professional profile",
    "about",
    "about me",
    "objective",
    "career objective",
    "overview",
];

const SKILLS_HEADERS: &[&str] = &[
    "skills",
    "technical skills",
    "core skills",
    "key skills",
    "skills and abilities",
    "skills & abilities",
    "core competencies",
    "competencies",
    "technologies",
    "technical expertise",
    "tools and technologies",
    "tools & technologies",
    "tech stack",
    "expertise",
];

const EXPERIENCE_HEADERS: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "relevant experience",
    "employment",
    "employment history",
    "work history",
    "career history",
    "professional background",
    "positions held",
];

const EDUCATION_HEADERS: &[&str] = &[
    "education",
    "education and training",
    "education & training",
    "academic background",
    "academic history",
    "academics",
    "qualifications",
    "academic qualifications",
    "educational background",
];

const OTHER_HEADERS: &[&str] = &[
    "projects",
    "personal projects",
    "key projects",
    "certifications",
    "certificates",
    "licenses",
    "licenses and certifications",
    "licenses & certifications",
    "awards",
    "honors",
    "honors and awards",
    "honors & awards",
    "achievements",
    "publications",
    "interests",
    "hobbies",
    "references",
    "volunteer",
    "volunteering",
    "volunteer experience",
    "activities",
    "extracurricular activities",
    "memberships",
    "affiliations",
];

const MAX_HEADER_WORDS: usize = 6;
const MAX_HEADER_CHARS: usize = 48;
const MAX_INLINE_HEADER_WORDS: usize = 4;

/// One block after segmentation. `index` is the block's position in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBlock {
    pub index: usize,
    pub text: String,
    pub position: SourcePosition,
    pub status: BlockStatus,
    pub is_header: bool,
}

/// Blocks grouped by section, each group in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionedResume {
    pub sections: BTreeMap<SectionLabel, Vec<SectionBlock>>,
    pub headers_detected: bool,
}

impl SectionedResume {
    pub fn section(&self, label: SectionLabel) -> &[SectionBlock] {
        self.sections.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_section(&self, label: SectionLabel) -> bool {
        self.sections
            .get(&label)
            .is_some_and(|blocks| blocks.iter().any(|b| !b.is_header))
    }

    /// Every block with its label, in reading order.
    pub fn labeled_blocks(&self) -> Vec<(SectionLabel, &SectionBlock)> {
        let mut all: Vec<(SectionLabel, &SectionBlock)> = self
            .sections
            .iter()
            .flat_map(|(label, blocks)| blocks.iter().map(move |b| (*label, b)))
            .collect();
        all.sort_by_key(|(_, b)| b.index);
        all
    }
}

/// Lowercases, drops trailing colons and punctuation, collapses whitespace.
fn normalize_header(line: &str) -> String {
    line.trim()
        .trim_end_matches([':', '.', '-', '|'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn label_for(normalized: &str) -> Option<SectionLabel> {
    let tables: [(SectionLabel, &[&str]); 6] = [
        (SectionLabel::Contact, CONTACT_HEADERS),
        (SectionLabel::Summary, SUMMARY_HEADERS),
        (SectionLabel::Skills, SKILLS_HEADERS),
        (SectionLabel::Experience, EXPERIENCE_HEADERS),
        (SectionLabel::Education, EDUCATION_HEADERS),
        (SectionLabel::Other, OTHER_HEADERS),
    ];
    tables
        .iter()
        .find(|(_, keywords)| keywords.contains(&normalized))
        .map(|(label, _)| *label)
}

/// Recognizes a standalone header line ("EXPERIENCE", "Technical Skills:").
pub fn detect_header(line: &str) -> Option<SectionLabel> {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || trimmed.chars().count() > MAX_HEADER_CHARS
        || trimmed.split_whitespace().count() > MAX_HEADER_WORDS
    {
        return None;
    }
    let first = trimmed.chars().find(|c| c.is_alphabetic())?;
    if !first.is_uppercase() {
        return None;
    }
    label_for(&normalize_header(trimmed))
}

/// Recognizes "Skills: Rust, Go" style lines. Returns the label and the remainder.
fn detect_inline_header(line: &str) -> Option<(SectionLabel, &str)> {
    let (head, rest) = line.split_once(':')?;
    let rest = rest.trim();
    if rest.is_empty() || head.split_whitespace().count() > MAX_INLINE_HEADER_WORDS {
        return None;
    }
    let label = detect_header(head)?;
    Some((label, rest))
}

/// Assigns every block to a section. Blocks before the first header are CONTACT; when no
/// header is found anywhere, every block lands in OTHER.
pub fn segment(text: &NormalizedText) -> SectionedResume {
    let mut sections: BTreeMap<SectionLabel, Vec<SectionBlock>> = BTreeMap::new();
    let mut current = SectionLabel::Contact;
    let mut headers_detected = false;

    for (index, block) in text.blocks.iter().enumerate() {
        let mut out = SectionBlock {
            index,
            text: block.text.clone(),
            position: block.position,
            status: block.status,
            is_header: false,
        };

        if block.status == BlockStatus::Readable {
            if let Some(label) = detect_header(&block.text) {
                current = label;
                headers_detected = true;
                out.is_header = true;
            } else if let Some((label, rest)) = detect_inline_header(&block.text) {
                current = label;
                headers_detected = true;
                out.text = rest.to_string();
            }
        }

        sections.entry(current).or_default().push(out);
    }

    if !headers_detected {
        let mut all: Vec<SectionBlock> = sections.into_values().flatten().collect();
        all.sort_by_key(|b| b.index);
        sections = BTreeMap::new();
        if !all.is_empty() {
            sections.insert(SectionLabel::Other, all);
        }
    }

    SectionedResume {
        sections,
        headers_detected,
    }
}
