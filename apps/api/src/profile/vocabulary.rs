//! Skill vocabulary: an immutable arena of canonical skills plus an index from normalized
//! surface forms (names, synonyms, abbreviations) to arena slots.
//!
//! Loaded once at startup and shared as `Arc<SkillVocabulary>`; nothing mutates it afterwards.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::candidate::SkillId;

const BUILTIN_VOCABULARY: &str = include_str!("vocabulary.json");

/// Surface forms shorter than this never take part in fuzzy matching.
pub const MIN_FUZZY_FORM_CHARS: usize = 4;

// ────────────────────────────────────────────────────────────────────────────
// File format
// ────────────────────────────────────────────────────────────────────────────

/// One skill as written in a vocabulary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Surface forms matched in text. When empty, the display name is the only form.
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Forms too ambiguous for running text ("go", "r"). Only matched when they make up a
    /// whole list item, as in "Languages: Java, Go".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list_forms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyFile {
    pub skills: Vec<SkillDefinition>,
}

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse vocabulary JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate skill id '{0}'")]
    DuplicateId(String),

    #[error("surface form '{surface}' maps to both '{first}' and '{second}'")]
    ConflictingSurface {
        surface: String,
        first: String,
        second: String,
    },

    #[error("skill '{0}' has a surface form with no matchable characters")]
    EmptySurface(String),

    #[error("vocabulary contains no skills")]
    Empty,
}

// ────────────────────────────────────────────────────────────────────────────
// Arena
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SkillEntry {
    pub id: SkillId,
    pub name: String,
    pub category: String,
    /// Normalized surface forms (tokens joined by single spaces).
    pub forms: Vec<String>,
}

/// A normalized surface form eligible for fuzzy comparison.
#[derive(Debug, Clone)]
pub struct FuzzyForm {
    pub form: String,
    pub token_count: usize,
    pub char_count: usize,
    pub first: char,
    pub entry: usize,
}

#[derive(Debug)]
pub struct SkillVocabulary {
    entries: Vec<SkillEntry>,
    index: HashMap<String, usize>,
    list_index: HashMap<String, usize>,
    fuzzy_forms: Vec<FuzzyForm>,
    max_tokens: usize,
}

/// A token with its byte span in the source string. `text` is lowercased.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// An exact vocabulary hit: the arena slot and the token range that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyHit {
    pub entry: usize,
    pub token_start: usize,
    pub token_end: usize,
    pub start: usize,
    pub end: usize,
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '+' | '#' | '.')
}

/// Splits text into lowercase tokens. `+`, `#` and `.` are part of tokens so that
/// "C++", "C#" and "Node.js" survive; a trailing period (sentence end) is dropped.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    let push = |s: usize, e: usize, tokens: &mut Vec<Token>| {
        let raw = &text[s..e];
        let trimmed = raw.trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "+" || trimmed == "#" {
            return;
        }
        tokens.push(Token {
            text: trimmed.to_lowercase(),
            start: s,
            end: s + trimmed.len(),
        });
    };

    for (i, c) in text.char_indices() {
        if is_token_char(c) {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            push(s, i, &mut tokens);
        }
    }
    if let Some(s) = start {
        push(s, text.len(), &mut tokens);
    }
    tokens
}

/// Normalized form of a phrase: its tokens joined by single spaces.
pub fn normalize_phrase(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
}

// Never empty: construction rejects an empty definition list.
#[allow(clippy::len_without_is_empty)]
impl SkillVocabulary {
    /// The vocabulary compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_VOCABULARY).expect("built-in vocabulary is valid")
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile = serde_json::from_str(raw)?;
        Self::from_definitions(file.skills)
    }

    pub fn from_definitions(definitions: Vec<SkillDefinition>) -> Result<Self, VocabularyError> {
        if definitions.is_empty() {
            return Err(VocabularyError::Empty);
        }

        let mut entries = Vec::with_capacity(definitions.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut seen_ids = HashSet::new();
        let mut max_tokens = 1;
        let mut pending_list_forms: Vec<(usize, String)> = Vec::new();

        for def in definitions {
            if !seen_ids.insert(def.id.clone()) {
                return Err(VocabularyError::DuplicateId(def.id));
            }
            let slot = entries.len();

            let raw_forms = if def.synonyms.is_empty() {
                vec![def.name.clone()]
            } else {
                def.synonyms.clone()
            };

            let mut forms = Vec::new();
            for raw in raw_forms {
                let form = normalize_phrase(&raw);
                if form.is_empty() {
                    return Err(VocabularyError::EmptySurface(def.id));
                }
                match index.get(&form) {
                    Some(&other) if other != slot => {
                        return Err(VocabularyError::ConflictingSurface {
                            surface: form,
                            first: entries_id(&entries, other),
                            second: def.id,
                        });
                    }
                    Some(_) => continue,
                    None => {}
                }
                max_tokens = max_tokens.max(form.split(' ').count());
                index.insert(form.clone(), slot);
                forms.push(form);
            }

            for raw in &def.list_forms {
                let form = normalize_phrase(raw);
                if form.is_empty() {
                    return Err(VocabularyError::EmptySurface(def.id));
                }
                pending_list_forms.push((slot, form));
            }

            entries.push(SkillEntry {
                id: SkillId::new(def.id),
                name: def.name,
                category: def.category,
                forms,
            });
        }

        // List forms are checked once every regular form is indexed.
        let mut list_index: HashMap<String, usize> = HashMap::new();
        for (slot, form) in pending_list_forms {
            match index.get(&form).or_else(|| list_index.get(&form)) {
                Some(&other) if other != slot => {
                    return Err(VocabularyError::ConflictingSurface {
                        surface: form,
                        first: entries_id(&entries, other),
                        second: entries_id(&entries, slot),
                    });
                }
                Some(_) => {}
                None => {
                    list_index.insert(form, slot);
                }
            }
        }

        let mut fuzzy_forms: Vec<FuzzyForm> = entries
            .iter()
            .enumerate()
            .flat_map(|(slot, entry)| {
                entry.forms.iter().filter_map(move |form| {
                    let char_count = form.chars().count();
                    let first = form.chars().next()?;
                    (char_count >= MIN_FUZZY_FORM_CHARS).then(|| FuzzyForm {
                        form: form.clone(),
                        token_count: form.split(' ').count(),
                        char_count,
                        first,
                        entry: slot,
                    })
                })
            })
            .collect();
        fuzzy_forms.sort_by(|a, b| a.form.cmp(&b.form));

        Ok(Self {
            entries,
            index,
            list_index,
            fuzzy_forms,
            max_tokens,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, slot: usize) -> &SkillEntry {
        &self.entries[slot]
    }

    #[cfg(test)]
    pub fn lookup(&self, phrase: &str) -> Option<&SkillEntry> {
        self.index.get(&normalize_phrase(phrase)).map(|&i| &self.entries[i])
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn fuzzy_forms(&self) -> &[FuzzyForm] {
        &self.fuzzy_forms
    }

    /// Greedy longest-match scan over `tokens`. Hits never overlap.
    pub fn find_exact_tokens(&self, tokens: &[Token]) -> Vec<VocabularyHit> {
        let mut hits = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let longest = self.max_tokens.min(tokens.len() - i);
            let found = (1..=longest).rev().find_map(|n| {
                let phrase = tokens[i..i + n]
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.index.get(&phrase).map(|&entry| (entry, n))
            });

            match found {
                Some((entry, n)) => {
                    hits.push(VocabularyHit {
                        entry,
                        token_start: i,
                        token_end: i + n,
                        start: tokens[i].start,
                        end: tokens[i + n - 1].end,
                    });
                    i += n;
                }
                None => i += 1,
            }
        }
        hits
    }

    #[cfg(test)]
    pub fn find_exact(&self, text: &str) -> Vec<VocabularyHit> {
        self.find_exact_tokens(&tokenize(text))
    }

    /// Exact hits plus list forms that make up a whole item of a separated list in `text`.
    /// `tokens` must come from `tokenize(text)`. Sorted by position.
    pub fn find_with_list_items(&self, text: &str, tokens: &[Token]) -> Vec<VocabularyHit> {
        let mut hits = self.find_exact_tokens(tokens);
        if self.list_index.is_empty() {
            return hits;
        }

        let separators = text
            .char_indices()
            .filter(|(_, c)| is_list_separator(*c))
            .map(|(i, c)| (i, i + c.len_utf8()))
            .chain(std::iter::once((text.len(), text.len())));

        let mut item_start = 0;
        for (sep_start, sep_end) in separators {
            let lo = tokens.partition_point(|t| t.start < item_start);
            let hi = tokens.partition_point(|t| t.start < sep_start);
            item_start = sep_end;
            if lo >= hi {
                continue;
            }
            let phrase = tokens[lo..hi]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(&entry) = self.list_index.get(&phrase) {
                hits.push(VocabularyHit {
                    entry,
                    token_start: lo,
                    token_end: hi,
                    start: tokens[lo].start,
                    end: tokens[hi - 1].end,
                });
            }
        }

        hits.sort_by_key(|h| h.start);
        hits
    }
}

fn is_list_separator(c: char) -> bool {
    matches!(c, ',' | ';' | ':' | '|' | '/' | '(' | ')' | '•')
}

fn entries_id(entries: &[SkillEntry], slot: usize) -> String {
    entries
        .get(slot)
        .map(|e| e.id.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn def(id: &str, synonyms: &[&str]) -> SkillDefinition {
        SkillDefinition {
            id: id.to_string(),
            name: id.to_uppercase(),
            category: "test".to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            list_forms: Vec::new(),
        }
    }

    fn hit_ids<'a>(vocab: &'a SkillVocabulary, hits: &[VocabularyHit]) -> Vec<&'a str> {
        hits.iter().map(|h| vocab.entry(h.entry).id.as_str()).collect()
    }

    #[test]
    fn test_builtin_vocabulary_loads() {
        let vocab = SkillVocabulary::builtin();
        assert!(vocab.len() > 100);
        assert_eq!(vocab.lookup("Node.js").unwrap().id.as_str(), "nodejs");
        assert_eq!(vocab.lookup("golang").unwrap().id.as_str(), "go");
        assert!(vocab.lookup("go").is_none());
        assert_eq!(vocab.lookup("Scikit-Learn").unwrap().id.as_str(), "scikit_learn");
    }

    #[test]
    fn test_tokenize_keeps_symbols_and_offsets() {
        let text = "C++, C# and Node.js.";
        let tokens = tokenize(text);
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["c++", "c#", "and", "node.js"]);
        assert_eq!(&text[tokens[3].start..tokens[3].end], "Node.js");
    }

    #[test]
    fn test_find_exact_prefers_longest_phrase() {
        let vocab = SkillVocabulary::from_definitions(vec![
            def("sql", &["sql"]),
            def("sql_server", &["sql server"]),
            def("ml", &["machine learning"]),
        ])
        .unwrap();

        let hits = vocab.find_exact("SQL Server, SQL and Machine Learning");
        let ids: Vec<&str> = hits
            .iter()
            .map(|h| vocab.entry(h.entry).id.as_str())
            .collect();
        assert_eq!(ids, vec!["sql_server", "sql", "ml"]);
        assert_eq!((hits[0].start, hits[0].end), (0, 10));
    }

    #[test]
    fn test_list_form_only_matches_whole_list_items() {
        let vocab = SkillVocabulary::builtin();
        let find = |text: &str| vocab.find_with_list_items(text, &tokenize(text));

        let text = "Languages: Java, Go";
        let hits = find(text);
        assert_eq!(hit_ids(&vocab, &hits), vec!["java", "go"]);
        assert_eq!(&text[hits[1].start..hits[1].end], "Go");

        assert_eq!(hit_ids(&vocab, &find("Required: Go")), vec!["go"]);
        assert_eq!(hit_ids(&vocab, &find("Go | Rust")), vec!["go", "rust"]);
        assert!(find("Ready to go the extra mile").is_empty());
        assert!(vocab.find_exact("Java, Go").iter().all(|h| vocab.entry(h.entry).id.as_str() == "java"));
    }

    #[test]
    fn test_list_form_conflicting_with_synonym_is_rejected() {
        let mut golang = def("go", &["golang"]);
        golang.list_forms = vec!["rust".to_string()];
        let err = SkillVocabulary::from_definitions(vec![golang, def("rust", &["rust"])])
            .unwrap_err();
        assert!(matches!(err, VocabularyError::ConflictingSurface { ref surface, .. } if surface == "rust"));
    }

    #[test]
    fn test_conflicting_surface_is_rejected() {
        let err = SkillVocabulary::from_definitions(vec![
            def("spark", &["spark"]),
            def("apache_spark", &["Spark"]),
        ])
        .unwrap_err();
        assert!(matches!(err, VocabularyError::ConflictingSurface { .. }));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let err =
            SkillVocabulary::from_definitions(vec![def("a", &["aa"]), def("a", &["bb"])])
                .unwrap_err();
        assert!(matches!(err, VocabularyError::DuplicateId(ref id) if id == "a"));
    }

    #[test]
    fn test_empty_vocabulary_is_rejected() {
        let err = SkillVocabulary::from_json(r#"{"skills": []}"#).unwrap_err();
        assert!(matches!(err, VocabularyError::Empty));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"skills": [{{"id": "elixir", "name": "Elixir", "category": "programming_languages"}}]}}"#
        )
        .unwrap();

        let vocab = SkillVocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.len(), 1);
        assert_eq!(vocab.lookup("elixir").unwrap().name, "Elixir");
        assert_eq!(vocab.fuzzy_forms().len(), 1);
    }
}
