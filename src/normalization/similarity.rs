use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum score for a candidate to be considered at all.
pub const LOW_CONFIDENCE_FLOOR: f64 = 0.75;
/// Lower bound of the medium tier.
pub const MEDIUM_CONFIDENCE_FLOOR: f64 = 0.80;
/// Lower bound of the high tier; fuzzy matches at or above this are auto-mapped.
pub const HIGH_CONFIDENCE_FLOOR: f64 = 0.92;

/// Bigram Dice coefficient between two (already normalized) strings.
///
/// Shared bigrams are counted with multiplicity, so "aaaa" vs "aa" shares one
/// "aa" pair, not three. Returns a value in `[0, 1]`.
pub fn score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let left = bigrams(a);
    let right = bigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let mut remaining: HashMap<(char, char), usize> = HashMap::with_capacity(right.len());
    for pair in &right {
        *remaining.entry(*pair).or_insert(0) += 1;
    }

    let mut shared = 0usize;
    for pair in &left {
        if let Some(count) = remaining.get_mut(pair) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    (2 * shared) as f64 / (left.len() + right.len()) as f64
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Confidence bucket derived from a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Tier for a match score, or `None` when the score is below the
    /// candidate floor and should be dropped silently.
    pub fn classify(score: f64) -> Option<Self> {
        if score >= HIGH_CONFIDENCE_FLOOR {
            Some(Self::High)
        } else if score >= MEDIUM_CONFIDENCE_FLOOR {
            Some(Self::Medium)
        } else if score >= LOW_CONFIDENCE_FLOOR {
            Some(Self::Low)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_and_short_inputs() {
        assert_eq!(score("mahomes", "mahomes"), 1.0);
        assert_eq!(score("a", "a"), 1.0);
        assert_eq!(score("a", "ab"), 0.0);
        assert_eq!(score("ab", "b"), 0.0);
        assert_eq!(score("", ""), 0.0);
    }

    #[test]
    fn counts_shared_bigrams_with_multiplicity() {
        // "aaaa" -> aa,aa,aa ; "aa" -> aa ; shared = 1
        assert!((score("aaaa", "aa") - 0.5).abs() < 1e-9);
        // night/nacht share only "ht"
        assert!((score("night", "nacht") - 0.25).abs() < 1e-9);
    }

    #[test]
    fn near_names_score_high() {
        assert!(score("patrick mahomes", "patrick mahomes ii") > 0.9);
        assert!(score("john smith", "jon smith") >= LOW_CONFIDENCE_FLOOR);
        assert!(score("john smith", "dave jones") < LOW_CONFIDENCE_FLOOR);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(ConfidenceTier::classify(1.0), Some(ConfidenceTier::High));
        assert_eq!(ConfidenceTier::classify(0.92), Some(ConfidenceTier::High));
        assert_eq!(ConfidenceTier::classify(0.9199), Some(ConfidenceTier::Medium));
        assert_eq!(ConfidenceTier::classify(0.80), Some(ConfidenceTier::Medium));
        assert_eq!(ConfidenceTier::classify(0.7999), Some(ConfidenceTier::Low));
        assert_eq!(ConfidenceTier::classify(0.75), Some(ConfidenceTier::Low));
        assert_eq!(ConfidenceTier::classify(0.7499), None);
        assert_eq!(ConfidenceTier::classify(0.0), None);
    }

    proptest! {
        #[test]
        fn score_is_symmetric(a in ".{0,20}", b in ".{0,20}") {
            prop_assert_eq!(score(&a, &b), score(&b, &a));
        }

        #[test]
        fn score_is_bounded(a in ".{0,20}", b in ".{0,20}") {
            let s = score(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn self_score_is_one(a in ".{1,20}") {
            prop_assert_eq!(score(&a, &a), 1.0);
        }

        #[test]
        fn tiers_are_monotonic(x in 0.0f64..=1.0, y in 0.0f64..=1.0) {
            let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
            prop_assert!(ConfidenceTier::classify(lo) <= ConfidenceTier::classify(hi));
        }
    }
}
