//! Years of experience and job titles.
//!
//! Date ranges are unioned at month granularity so overlapping (concurrent) roles are counted
//! once. Explicit "N years of experience" statements are the fallback when no range parses.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Statements above this are treated as noise ("100 years of combined experience").
const MAX_PLAUSIBLE_YEARS: f64 = 50.0;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static DATE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    let date = format!(
        r"(?:{MONTH}\.?,?\s+(?:19|20)\d{{2}}|(?:0?[1-9]|1[0-2])\s*[/.-]\s*(?:19|20)\d{{2}}|(?:19|20)\d{{2}})"
    );
    Regex::new(&format!(
        r"(?i)\b(?P<start>{date})\s*(?:-|–|—|to|until|till|through)\s*(?P<end>{date}|present|current|now|today)\b"
    ))
    .unwrap()
});

static MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^(?P<month>{MONTH})\.?,?\s+(?P<year>\d{{4}})$")).unwrap()
});

static NUMERIC_MONTH_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<month>\d{1,2})\s*[/.-]\s*(?P<year>\d{4})$").unwrap());

/// "5+ years of experience", "3-5 years working", "10 years in the field".
static YEARS_STATEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?P<n>\d{1,2}(?:\.\d+)?)\s*\+?\s*(?:(?:-|–|to)\s*\d{1,2}(?:\.\d+)?\s*\+?\s*)?(?:years?|yrs?)\b(?:\s+[\w+#./-]+){0,4}?\s+(?:experience|working|in\s+the\s+field)",
    )
    .unwrap()
});

/// "Experience: 5 years".
static EXPERIENCE_COLON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bexperience\s*:\s*(?P<n>\d{1,2}(?:\.\d+)?)\s*\+?\s*(?:years?|yrs?)?\b").unwrap()
});

/// Any "N years" mention; job descriptions rarely say "of experience" after every figure.
static YEARS_MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?P<n>\d{1,2}(?:\.\d+)?)\s*\+?\s*(?:(?:-|–|to)\s*\d{1,2}(?:\.\d+)?\s*\+?\s*)?(?:years?|yrs?)\b",
    )
    .unwrap()
});

static ROLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:engineer|developer|analyst|manager|scientist|architect|consultant|designer|administrator|intern|(?:tech|team)\s+lead|director|specialist|programmer|technician|officer|coordinator|head\s+of)s?\b",
    )
    .unwrap()
});

static TITLE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\||,|;|–|—|\s-\s|\s@\s|\bat\b)\s*").unwrap());

const MAX_TITLE_WORDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    fn ordinal(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }
}

/// Half-open month interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl DateRange {
    pub fn months(&self) -> i64 {
        (self.end.ordinal() - self.start.ordinal()).max(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeIssue {
    Inverted(String),
    StartsAfterAsOf(String),
}

/// All date ranges found in `text`, resolved against `as_of`. Inverted ranges are reported
/// instead of returned; ends in the future are clamped to `as_of`.
pub fn parse_date_ranges(text: &str, as_of: NaiveDate) -> (Vec<DateRange>, Vec<RangeIssue>) {
    let now = YearMonth::from_date(as_of);
    let mut ranges = Vec::new();
    let mut issues = Vec::new();

    for caps in DATE_RANGE_RE.captures_iter(text) {
        let raw = caps[0].to_string();
        let (Some(start), Some(end)) = (parse_date(&caps["start"], now), parse_date(&caps["end"], now))
        else {
            continue;
        };

        if start > end {
            issues.push(RangeIssue::Inverted(raw));
            continue;
        }
        if start > now {
            issues.push(RangeIssue::StartsAfterAsOf(raw));
            continue;
        }
        ranges.push(DateRange {
            start,
            end: end.min(now),
        });
    }

    (ranges, issues)
}

fn parse_date(raw: &str, now: YearMonth) -> Option<YearMonth> {
    let raw = raw.trim();
    let lower = raw.to_lowercase();
    if matches!(lower.as_str(), "present" | "current" | "now" | "today") {
        return Some(now);
    }
    if let Some(caps) = MONTH_YEAR_RE.captures(raw) {
        return Some(YearMonth::new(caps["year"].parse().ok()?, month_number(&caps["month"])?));
    }
    if let Some(caps) = NUMERIC_MONTH_YEAR_RE.captures(raw) {
        let month: u32 = caps["month"].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        return Some(YearMonth::new(caps["year"].parse().ok()?, month));
    }
    // Year only: counted from January.
    let year: i32 = raw.parse().ok()?;
    Some(YearMonth::new(year, 1))
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let n = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

/// Total months covered by the union of `ranges`; overlaps count once.
pub fn union_months(ranges: &[DateRange]) -> i64 {
    let mut sorted: Vec<DateRange> = ranges.iter().copied().filter(|r| r.months() > 0).collect();
    sorted.sort_unstable_by_key(|r| (r.start, r.end));

    let mut total = 0;
    let mut current: Option<DateRange> = None;
    for range in sorted {
        current = match current {
            Some(c) if range.start <= c.end => Some(DateRange {
                start: c.start,
                end: c.end.max(range.end),
            }),
            Some(c) => {
                total += c.months();
                Some(range)
            }
            None => Some(range),
        };
    }
    total + current.map_or(0, |c| c.months())
}

pub fn months_to_years(months: i64) -> f64 {
    round2(months as f64 / 12.0)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn max_years<'a>(text: &str, patterns: impl IntoIterator<Item = &'a Regex>) -> Option<f64> {
    patterns
        .into_iter()
        .flat_map(|re| re.captures_iter(text).collect::<Vec<Captures>>())
        .filter_map(|caps| caps["n"].parse::<f64>().ok())
        .filter(|n| *n > 0.0 && *n <= MAX_PLAUSIBLE_YEARS)
        .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.max(n))))
}

/// Largest explicit experience statement in a resume ("5+ years of experience").
pub fn parse_years_statement(text: &str) -> Option<f64> {
    max_years(text, [&*YEARS_STATEMENT_RE, &*EXPERIENCE_COLON_RE])
}

/// Largest "N years" figure anywhere in `text`; for ranges the lower bound counts.
pub fn parse_years_mention(text: &str) -> Option<f64> {
    max_years(text, [&*YEARS_MENTION_RE])
}

/// A title-like phrase from one experience line, or `None` when the line names no role.
pub fn title_from_line(line: &str) -> Option<String> {
    let stripped = DATE_RANGE_RE.replace_all(line, " ");
    TITLE_SPLIT_RE
        .split(&stripped)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .find(|part| ROLE_RE.is_match(part) && part.split_whitespace().count() <= MAX_TITLE_WORDS)
        .map(|part| part.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
}

/// Titles in order of first appearance, deduplicated case-insensitively.
pub fn extract_titles<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    lines
        .into_iter()
        .filter_map(title_from_line)
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_overlapping_ranges_count_once() {
        let text = "Acme Corp, Jan 2019 - Jan 2021\nGlobex, Jun 2020 – Jun 2022";
        let (ranges, issues) = parse_date_ranges(text, as_of());
        assert!(issues.is_empty());
        assert_eq!(ranges.len(), 2);
        let months = union_months(&ranges);
        assert_eq!(months, 41);
        let years = months_to_years(months);
        assert!((years - 3.42).abs() < 0.01, "got {years}");
    }

    #[test]
    fn test_present_resolves_to_as_of() {
        let (ranges, _) = parse_date_ranges("03/2018 - Present", as_of());
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, YearMonth::new(2018, 3));
        assert_eq!(ranges[0].end, YearMonth::new(2024, 6));
    }

    #[test]
    fn test_year_only_and_textual_separators() {
        let (ranges, _) = parse_date_ranges("2016 to 2019; September 2019 until Dec 2020", as_of());
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].months(), 36);
        assert_eq!(ranges[1].start, YearMonth::new(2019, 9));
    }

    #[test]
    fn test_inverted_range_is_reported() {
        let (ranges, issues) = parse_date_ranges("Jun 2021 - Jan 2019", as_of());
        assert!(ranges.is_empty());
        assert!(matches!(issues.as_slice(), [RangeIssue::Inverted(_)]));
    }

    #[test]
    fn test_future_end_is_clamped() {
        let (ranges, _) = parse_date_ranges("Jan 2023 - Dec 2030", as_of());
        assert_eq!(ranges[0].end, YearMonth::new(2024, 6));
    }

    #[test]
    fn test_disjoint_ranges_sum() {
        let ranges = vec![
            DateRange { start: YearMonth::new(2015, 1), end: YearMonth::new(2016, 1) },
            DateRange { start: YearMonth::new(2018, 1), end: YearMonth::new(2018, 7) },
        ];
        assert_eq!(union_months(&ranges), 18);
    }

    #[test]
    fn test_years_statement_fallback() {
        assert_eq!(parse_years_statement("Over 5+ years of experience in backend"), Some(5.0));
        assert_eq!(parse_years_statement("Experience: 7 years"), Some(7.0));
        assert_eq!(parse_years_statement("3-5 years of professional experience"), Some(3.0));
        assert_eq!(parse_years_statement("12 years in the field"), Some(12.0));
        assert_eq!(parse_years_statement("Won 3 awards"), None);
        assert_eq!(parse_years_statement("80 years of combined experience"), None);
    }

    #[test]
    fn test_years_mention_takes_largest() {
        assert_eq!(
            parse_years_mention("3+ years Python, 5 years overall in industry"),
            Some(5.0)
        );
    }

    #[test]
    fn test_titles_from_experience_lines() {
        let lines = [
            "Senior Software Engineer | Acme Corp | Jan 2019 - Present",
            "Built billing pipeline",
            "Data Analyst at Globex, 2016 - 2018",
            "senior software engineer, Initech",
        ];
        assert_eq!(
            extract_titles(lines),
            vec!["Senior Software Engineer".to_string(), "Data Analyst".to_string()]
        );
    }
}
