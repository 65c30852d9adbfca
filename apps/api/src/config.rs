use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::screening::ScreeningError;

/// Application configuration loaded from environment variables.
/// Everything has a default except the embedding model, which is required once
/// `EMBEDDING_API_URL` switches the embedding backend on.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// JSON vocabulary file; the built-in vocabulary is used when unset.
    pub skill_vocabulary_path: Option<PathBuf>,
    pub max_upload_mb: usize,
    pub embedding: Option<EmbeddingConfig>,
    /// Defaults for every screening; requests may override them.
    pub screening: ScreeningConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let embedding = match lookup("EMBEDDING_API_URL").filter(|v| !v.trim().is_empty()) {
            Some(api_url) => Some(EmbeddingConfig {
                api_url,
                api_key: lookup("EMBEDDING_API_KEY").filter(|v| !v.is_empty()),
                model: require_env(&lookup, "EMBEDDING_MODEL")?,
            }),
            None => None,
        };

        let defaults = ScreeningConfig::default();
        let screening = ScreeningConfig {
            fuzzy_match_threshold: parse_or(
                &lookup,
                "FUZZY_MATCH_THRESHOLD",
                defaults.fuzzy_match_threshold,
            )?,
            missing_required_penalty: parse_or(
                &lookup,
                "MISSING_REQUIRED_PENALTY",
                defaults.missing_required_penalty,
            )?,
            factor_weights: parse_or(&lookup, "FACTOR_WEIGHTS", defaults.factor_weights)?,
            max_concurrency: parse_or(&lookup, "MAX_CONCURRENCY", defaults.max_concurrency)?,
            per_document_timeout_seconds: parse_or(
                &lookup,
                "PER_DOCUMENT_TIMEOUT_SECONDS",
                defaults.per_document_timeout_seconds,
            )?,
            education_grade_step: parse_or(
                &lookup,
                "EDUCATION_GRADE_STEP",
                defaults.education_grade_step,
            )?,
            as_of: None,
        };
        screening
            .validate()
            .context("Invalid screening defaults in environment")?;

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            skill_vocabulary_path: lookup("SKILL_VOCABULARY_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            max_upload_mb: parse_or(&lookup, "MAX_UPLOAD_MB", 25usize)?,
            embedding,
            screening,
        })
    }
}

fn require_env(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Screening options
// ────────────────────────────────────────────────────────────────────────────

/// Relative weight of each factor in the composite score. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            skills: 60.0,
            experience: 25.0,
            education: 15.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("expected three comma-separated numbers (skills,experience,education), got '{0}'")]
pub struct FactorWeightsParseError(String);

impl FromStr for FactorWeights {
    type Err = FactorWeightsParseError;

    /// Parses "60,25,15".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| FactorWeightsParseError(s.to_string()))?;
        match parts.as_slice() {
            [skills, experience, education] => Ok(Self {
                skills: *skills,
                experience: *experience,
                education: *education,
            }),
            _ => Err(FactorWeightsParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningConfig {
    pub fuzzy_match_threshold: f64,
    pub missing_required_penalty: f64,
    pub factor_weights: FactorWeights,
    pub max_concurrency: usize,
    pub per_document_timeout_seconds: f64,
    /// Score lost per education level below the requirement.
    pub education_grade_step: f64,
    /// Date "Present" resolves to. Captured once per batch when unset.
    pub as_of: Option<NaiveDate>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: 0.8,
            missing_required_penalty: 0.5,
            factor_weights: FactorWeights::default(),
            max_concurrency: 4,
            per_document_timeout_seconds: 30.0,
            education_grade_step: 25.0,
            as_of: None,
        }
    }
}

/// Partial per-request override of [`ScreeningConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreeningOverrides {
    pub fuzzy_match_threshold: Option<f64>,
    pub missing_required_penalty: Option<f64>,
    pub factor_weights: Option<FactorWeights>,
    pub max_concurrency: Option<usize>,
    pub per_document_timeout_seconds: Option<f64>,
    pub education_grade_step: Option<f64>,
    pub as_of: Option<NaiveDate>,
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

impl ScreeningConfig {
    pub fn with_overrides(&self, overrides: ScreeningOverrides) -> Self {
        Self {
            fuzzy_match_threshold: overrides
                .fuzzy_match_threshold
                .unwrap_or(self.fuzzy_match_threshold),
            missing_required_penalty: overrides
                .missing_required_penalty
                .unwrap_or(self.missing_required_penalty),
            factor_weights: overrides.factor_weights.unwrap_or(self.factor_weights),
            max_concurrency: overrides.max_concurrency.unwrap_or(self.max_concurrency),
            per_document_timeout_seconds: overrides
                .per_document_timeout_seconds
                .unwrap_or(self.per_document_timeout_seconds),
            education_grade_step: overrides
                .education_grade_step
                .unwrap_or(self.education_grade_step),
            as_of: overrides.as_of.or(self.as_of),
        }
    }

    /// Per-document extraction budget. Values `validate` rejects saturate instead of panicking.
    pub fn per_document_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.per_document_timeout_seconds).unwrap_or(Duration::MAX)
    }

    /// Rejects out-of-range options before any document is touched.
    pub fn validate(&self) -> Result<(), ScreeningError> {
        let w = &self.factor_weights;
        let weights = [w.skills, w.experience, w.education];
        if weights.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(ScreeningError::InvalidWeightConfig(format!(
                "weights must be non-negative numbers, got {}/{}/{}",
                w.skills, w.experience, w.education
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScreeningError::InvalidWeightConfig(format!(
                "weights must sum to 100, got {sum}"
            )));
        }

        in_unit_range("fuzzy_match_threshold", self.fuzzy_match_threshold)?;
        in_unit_range("missing_required_penalty", self.missing_required_penalty)?;

        if self.max_concurrency == 0 {
            return Err(ScreeningError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if !self.per_document_timeout_seconds.is_finite() || self.per_document_timeout_seconds <= 0.0
        {
            return Err(ScreeningError::InvalidConfig(format!(
                "per_document_timeout_seconds must be positive, got {}",
                self.per_document_timeout_seconds
            )));
        }
        if Duration::try_from_secs_f64(self.per_document_timeout_seconds).is_err() {
            return Err(ScreeningError::InvalidConfig(format!(
                "per_document_timeout_seconds is too large, got {}",
                self.per_document_timeout_seconds
            )));
        }
        if !(0.0..=100.0).contains(&self.education_grade_step) {
            return Err(ScreeningError::InvalidConfig(format!(
                "education_grade_step must be within 0..=100, got {}",
                self.education_grade_step
            )));
        }
        Ok(())
    }
}

fn in_unit_range(name: &str, value: f64) -> Result<(), ScreeningError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ScreeningError::InvalidConfig(format!(
            "{name} must be within 0..=1, got {value}"
        )))
    }
}
