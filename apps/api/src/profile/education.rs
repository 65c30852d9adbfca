//! Degree recognition for resumes and job descriptions.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::candidate::EducationLevel;

const MAX_DETAIL_LINES: usize = 3;

static LEVEL_PATTERNS: Lazy<Vec<(EducationLevel, Regex)>> = Lazy::new(|| {
    [
        (
            EducationLevel::Doctorate,
            r"(?i)\b(?:ph\.?\s?d|doctorate|doctoral|d\.phil|doctor\s+of)\b",
        ),
        (
            // "Scrum Master" is a certification, so a bare "master" does not count.
            EducationLevel::Master,
            r"(?i)\b(?:master'?s|masters|master\s+of|master\s+in|m\.?sc|m\.s|m\.a|mba|m\.?tech|m\.?eng)\b",
        ),
        (
            EducationLevel::Bachelor,
            r"(?i)\b(?:bachelor'?s?|b\.?sc|b\.s|b\.a|b\.?tech|b\.?eng|b\.e|bs\s+in|ba\s+in|undergraduate\s+degree)\b",
        ),
        (
            EducationLevel::Associate,
            r"(?i)\b(?:associate'?s?\s+degree|associate\s+of\s+(?:arts|science|applied)|diploma\s+in)\b",
        ),
        (
            EducationLevel::HighSchool,
            r"(?i)\b(?:high\s+school|secondary\s+school|ged|a-levels?|a\s+levels)\b",
        ),
    ]
    .into_iter()
    .map(|(level, pattern)| (level, Regex::new(pattern).unwrap()))
    .collect()
});

static INSTITUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:university|college|institute|polytechnic|academy|school)\b").unwrap()
});

/// Every degree level mentioned in `text`.
pub fn levels_mentioned(text: &str) -> Vec<EducationLevel> {
    LEVEL_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(level, _)| *level)
        .collect()
}

/// Highest level mentioned across `lines`; NONE when nothing is recognized.
pub fn highest_level<'a>(lines: impl IntoIterator<Item = &'a str>) -> EducationLevel {
    lines
        .into_iter()
        .flat_map(levels_mentioned)
        .max()
        .unwrap_or_default()
}

/// Lowest level a job description mentions, i.e. the minimum it accepts.
pub fn minimum_level(text: &str) -> Option<EducationLevel> {
    levels_mentioned(text).into_iter().min()
}

/// Up to three lines naming a degree or an institution, in reading order.
pub fn detail_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    lines
        .into_iter()
        .filter(|line| !levels_mentioned(line).is_empty() || INSTITUTION_RE.is_match(line))
        .take(MAX_DETAIL_LINES)
        .map(str::to_string)
        .collect()
}
