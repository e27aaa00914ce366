//! Tunables for resolution and review, read from the environment.

use crate::matching::engine::DEFAULT_FALLBACK_SCAN_LIMIT;
use crate::util::env::{env_flag, env_parse};

/// Runtime knobs shared by the bulk job, the review workflow and the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Restrict candidates to the target's position when it has one.
    pub position_filter: bool,
    /// Candidates scanned when a surname has no bucket (`MAPPER_FALLBACK_SCAN_LIMIT`).
    pub fallback_scan_limit: usize,
    /// Live suggestions attached to each review entry.
    pub suggestion_limit: usize,
    /// Default page size for review listings and reports.
    pub default_limit: i64,
    /// Upper bound accepted for caller-supplied limits.
    pub max_limit: i64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            position_filter: true,
            fallback_scan_limit: DEFAULT_FALLBACK_SCAN_LIMIT,
            suggestion_limit: 5,
            default_limit: 50,
            max_limit: 500,
        }
    }
}

impl MapperConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            position_filter: env_flag("MAPPER_POSITION_FILTER", d.position_filter),
            fallback_scan_limit: env_parse("MAPPER_FALLBACK_SCAN_LIMIT", d.fallback_scan_limit),
            suggestion_limit: env_parse("MAPPER_SUGGESTION_LIMIT", d.suggestion_limit),
            default_limit: env_parse("MAPPER_REVIEW_DEFAULT_LIMIT", d.default_limit),
            max_limit: env_parse("MAPPER_MAX_LIMIT", d.max_limit),
        }
    }

    /// Apply the default and clamp to `1..=max_limit`.
    pub fn limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        let cfg = MapperConfig::default();
        assert_eq!(cfg.limit(None), 50);
        assert_eq!(cfg.limit(Some(0)), 1);
        assert_eq!(cfg.limit(Some(-4)), 1);
        assert_eq!(cfg.limit(Some(20)), 20);
        assert_eq!(cfg.limit(Some(10_000)), 500);
    }
}
