//! Runtime tunables for the roster service.
//!
//! # Responsibility
//! - Carry page-size, ranking and normalization defaults.
//! - Clamp caller-provided limits into the configured bounds.
//!
//! # Invariants
//! - A validated config has non-zero maxima, defaults within maxima and a
//!   finite default weight.

use crate::ingest::normalize::{NormalizeOptions, DEFAULT_MEMBERSHIP_WEIGHT};
use crate::search::index::DEFAULT_SEARCH_LIMIT;
use crate::similarity::matrix::SimilarityWeighting;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const SEARCH_LIMIT_MAX: u32 = 100;
const SIMILARITY_DEFAULT_TOP: u32 = 5;
const SIMILARITY_TOP_MAX: u32 = 50;

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Service configuration. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub search_default_limit: u32,
    pub search_limit_max: u32,
    pub similarity_default_top: u32,
    pub similarity_top_max: u32,
    /// Weight for `unit_members` rows with a blank weight cell.
    pub default_weight: f64,
    pub weighting: SimilarityWeighting,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            search_default_limit: DEFAULT_SEARCH_LIMIT,
            search_limit_max: SEARCH_LIMIT_MAX,
            similarity_default_top: SIMILARITY_DEFAULT_TOP,
            similarity_top_max: SIMILARITY_TOP_MAX,
            default_weight: DEFAULT_MEMBERSHIP_WEIGHT,
            weighting: SimilarityWeighting::default(),
        }
    }
}

impl RosterConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Checks bound consistency, returning the config unchanged when valid.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.search_limit_max == 0 || self.similarity_top_max == 0 {
            return Err(ConfigError::Invalid(
                "search_limit_max and similarity_top_max must be positive".to_string(),
            ));
        }
        if self.search_default_limit > self.search_limit_max {
            return Err(ConfigError::Invalid(format!(
                "search_default_limit {} exceeds search_limit_max {}",
                self.search_default_limit, self.search_limit_max
            )));
        }
        if self.similarity_default_top > self.similarity_top_max {
            return Err(ConfigError::Invalid(format!(
                "similarity_default_top {} exceeds similarity_top_max {}",
                self.similarity_default_top, self.similarity_top_max
            )));
        }
        if !self.default_weight.is_finite() {
            return Err(ConfigError::Invalid(
                "default_weight must be finite".to_string(),
            ));
        }
        Ok(self)
    }

    /// Effective search page size: default when unset, clamped to the max.
    ///
    /// `Some(0)` stays 0 and yields an empty page.
    pub fn search_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.search_default_limit)
            .min(self.search_limit_max)
    }

    /// Effective similarity result count, same rules as [`Self::search_limit`].
    pub fn similarity_top(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.similarity_default_top)
            .min(self.similarity_top_max)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            default_weight: self.default_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RosterConfig};
    use crate::similarity::matrix::SimilarityWeighting;

    #[test]
    fn limits_default_and_clamp() {
        let config = RosterConfig::default();
        assert_eq!(config.search_limit(None), 20);
        assert_eq!(config.search_limit(Some(500)), 100);
        assert_eq!(config.search_limit(Some(0)), 0);
        assert_eq!(config.similarity_top(None), 5);
        assert_eq!(config.similarity_top(Some(80)), 50);
    }

    #[test]
    fn json_fields_are_optional() {
        let config = RosterConfig::from_json_str(r#"{"weighting": "inverse_weight"}"#).unwrap();
        assert_eq!(config.weighting, SimilarityWeighting::InverseWeight);
        assert_eq!(config.search_limit_max, 100);
    }

    #[test]
    fn inconsistent_bounds_are_rejected() {
        let err = RosterConfig::from_json_str(r#"{"search_default_limit": 10, "search_limit_max": 5}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RosterConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
