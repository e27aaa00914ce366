use serde::Serialize;

use super::index::{Candidate, CandidateIndex};
use crate::database_ops::models::SourceRecord;
use crate::normalization::similarity::LOW_CONFIDENCE_FLOOR;
use crate::normalization::{score, ConfidenceTier, NameVariations};

/// How many candidates are scanned when a surname has no bucket at all.
pub const DEFAULT_FALLBACK_SCAN_LIMIT: usize = 1000;

/// Result of resolving one target record against a [`CandidateIndex`].
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<'a> {
    /// A target variation equals a candidate's normalized name.
    Exact { candidate: &'a Candidate },
    /// Best fuzzy candidate that cleared the low-confidence floor.
    Fuzzy(ScoredCandidate<'a>),
    None,
}

impl MatchOutcome<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Exact { .. } => "exact",
            Self::Fuzzy(_) => "fuzzy",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a Candidate,
    pub score: f64,
    pub confidence: ConfidenceTier,
}

/// Review suggestion shape exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub candidate_id: String,
    pub candidate_name: String,
    pub score: f64,
    pub confidence: ConfidenceTier,
}

impl From<&ScoredCandidate<'_>> for Suggestion {
    fn from(s: &ScoredCandidate<'_>) -> Self {
        Self {
            candidate_id: s.candidate.record.id.clone(),
            candidate_name: s.candidate.record.display_name.clone(),
            score: s.score,
            confidence: s.confidence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchEngine {
    fallback_scan_limit: usize,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_SCAN_LIMIT)
    }
}

impl MatchEngine {
    pub fn new(fallback_scan_limit: usize) -> Self {
        Self {
            fallback_scan_limit,
        }
    }

    /// Resolve `target` against `index`.
    ///
    /// Steps, stopping at the first success:
    /// 1. any target variation found in the exact map
    /// 2. best fuzzy score within the target's last-name bucket
    /// 3. only when that bucket is empty, best fuzzy score over the first
    ///    `fallback_scan_limit` candidates
    ///
    /// When `position` is given, candidates with a different (or missing)
    /// position are never returned, on any path.
    pub fn resolve<'a>(
        &self,
        target: &SourceRecord,
        index: &'a CandidateIndex,
        position: Option<&str>,
    ) -> MatchOutcome<'a> {
        let variations = NameVariations::new(&target.display_name);
        if variations.is_empty() || index.is_empty() {
            return MatchOutcome::None;
        }

        for key in variations.lookup_keys() {
            if let Some(candidate) = index.exact(key) {
                if position_matches(candidate, position) {
                    return MatchOutcome::Exact { candidate };
                }
            }
        }

        let bucket = index.last_name_bucket(variations.last_name());
        let best = if bucket.is_empty() {
            best_match(
                &variations,
                index.candidates().iter().take(self.fallback_scan_limit),
                position,
            )
        } else {
            best_match(&variations, bucket.into_iter(), position)
        };

        match best {
            Some(scored) => MatchOutcome::Fuzzy(scored),
            None => MatchOutcome::None,
        }
    }

    /// Score every candidate and return the `max_results` best ones that clear
    /// the low-confidence floor, highest first. Read-only sibling of
    /// [`MatchEngine::resolve`] used for review suggestions.
    pub fn find_multiple_matches<'a>(
        &self,
        target: &SourceRecord,
        candidates: &'a [Candidate],
        max_results: usize,
    ) -> Vec<ScoredCandidate<'a>> {
        let variations = NameVariations::new(&target.display_name);
        if variations.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let mut scored: Vec<ScoredCandidate<'a>> = candidates
            .iter()
            .filter_map(|candidate| {
                let best = best_pair_score(&variations, &candidate.variations);
                ConfidenceTier::classify(best).map(|confidence| ScoredCandidate {
                    candidate,
                    score: best,
                    confidence,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.candidate.record.id.cmp(&b.candidate.record.id))
        });
        scored.truncate(max_results);
        scored
    }
}

fn position_matches(candidate: &Candidate, position: Option<&str>) -> bool {
    match position.map(str::trim).filter(|p| !p.is_empty()) {
        None => true,
        Some(wanted) => candidate
            .record
            .position
            .as_deref()
            .is_some_and(|have| have.trim().eq_ignore_ascii_case(wanted)),
    }
}

fn best_pair_score(target: &NameVariations, candidate: &NameVariations) -> f64 {
    let mut best = 0.0f64;
    for tv in target.iter() {
        for cv in candidate.iter() {
            let s = score(tv, cv);
            if s > best {
                best = s;
                if best >= 1.0 {
                    return best;
                }
            }
        }
    }
    best
}

fn best_match<'a, I>(
    target: &NameVariations,
    candidates: I,
    position: Option<&str>,
) -> Option<ScoredCandidate<'a>>
where
    I: Iterator<Item = &'a Candidate>,
{
    let mut best: Option<(&'a Candidate, f64)> = None;
    for candidate in candidates.filter(|c| position_matches(c, position)) {
        let s = best_pair_score(target, &candidate.variations);
        if best.map_or(true, |(_, top)| s > top) {
            best = Some((candidate, s));
        }
    }

    let (candidate, score) = best?;
    if score < LOW_CONFIDENCE_FLOOR {
        return None;
    }
    ConfidenceTier::classify(score).map(|confidence| ScoredCandidate {
        candidate,
        score,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::models::Provider;

    fn stats(name: &str) -> SourceRecord {
        SourceRecord::new(Provider::Stats, "a1", name)
    }

    fn draft(id: &str, name: &str) -> SourceRecord {
        SourceRecord::new(Provider::Draft, id, name)
    }

    #[test]
    fn nickname_variation_hits_exact_map() {
        let index = CandidateIndex::build(vec![draft("b1", "Pat Mahomes")]);
        let outcome = MatchEngine::default().resolve(&stats("Patrick Mahomes"), &index, None);
        match outcome {
            MatchOutcome::Exact { candidate } => assert_eq!(candidate.record.id, "b1"),
            other => panic!("expected exact, got {other:?}"),
        }
    }

    #[test]
    fn dotted_initials_match_exactly() {
        let index = CandidateIndex::build(vec![draft("b9", "DJ Moore"), draft("b2", "David Moore")]);
        let outcome = MatchEngine::default().resolve(&stats("D.J. Moore"), &index, None);
        assert!(matches!(outcome, MatchOutcome::Exact { candidate } if candidate.record.id == "b9"));
    }

    #[test]
    fn exact_beats_a_better_looking_fuzzy_candidate() {
        let index = CandidateIndex::build(vec![
            draft("fuzzy", "Patrick Mahomess"),
            draft("exact", "Patrick Mahomes"),
        ]);
        let outcome = MatchEngine::default().resolve(&stats("Patrick Mahomes"), &index, None);
        assert_eq!(outcome.kind(), "exact");
        assert!(matches!(outcome, MatchOutcome::Exact { candidate } if candidate.record.id == "exact"));
    }

    #[test]
    fn fuzzy_within_last_name_bucket() {
        let index = CandidateIndex::build(vec![
            draft("b1", "Jon Smith"),
            draft("b2", "Zed Smith"),
            draft("b3", "John Smyth"),
        ]);
        match MatchEngine::default().resolve(&stats("John Smith"), &index, None) {
            MatchOutcome::Fuzzy(s) => {
                assert_eq!(s.candidate.record.id, "b1");
                assert!(s.score >= LOW_CONFIDENCE_FLOOR);
            }
            other => panic!("expected fuzzy, got {other:?}"),
        }
    }

    #[test]
    fn position_filter_excludes_other_positions() {
        let index = CandidateIndex::build(vec![
            draft("wr", "Johnny Smith").with_position("WR"),
            draft("rb", "Xavier Smith").with_position("RB"),
        ]);
        let target = stats("John Smith").with_position("RB");
        let engine = MatchEngine::default();

        // Only the RB is eligible and it is far below the floor.
        assert_eq!(engine.resolve(&target, &index, Some("RB")), MatchOutcome::None);

        // Without the filter the WR is the best fuzzy candidate.
        match engine.resolve(&target, &index, None) {
            MatchOutcome::Fuzzy(s) => assert_eq!(s.candidate.record.id, "wr"),
            other => panic!("expected fuzzy, got {other:?}"),
        }
    }

    #[test]
    fn position_filter_also_applies_to_exact_hits() {
        let index = CandidateIndex::build(vec![
            draft("rb", "John Smith").with_position("RB"),
            draft("qb", "John Smith").with_position("QB"),
        ]);
        let target = stats("John Smith").with_position("rb");
        match MatchEngine::default().resolve(&target, &index, Some("rb")) {
            MatchOutcome::Fuzzy(s) => {
                assert_eq!(s.candidate.record.id, "rb");
                assert_eq!(s.confidence, ConfidenceTier::High);
            }
            other => panic!("expected fuzzy on the shadowed record, got {other:?}"),
        }
    }

    #[test]
    fn empty_bucket_falls_back_to_capped_scan() {
        let index = CandidateIndex::build(vec![
            draft("b1", "Tua Tagovailoa"),
            draft("b2", "Tua Tagovailo"),
        ]);
        // "tagovailoaa" has no bucket; scan finds b1
        let target = stats("Tua Tagovailoaa");
        match MatchEngine::default().resolve(&target, &index, None) {
            MatchOutcome::Fuzzy(s) => assert_eq!(s.candidate.record.id, "b1"),
            other => panic!("expected fuzzy, got {other:?}"),
        }

        // The cap hides anything past the prefix.
        let capped = MatchEngine::new(0);
        assert_eq!(capped.resolve(&target, &index, None), MatchOutcome::None);
    }

    #[test]
    fn no_candidates_means_no_match() {
        let index = CandidateIndex::build(Vec::new());
        assert_eq!(
            MatchEngine::default().resolve(&stats("Josh Allen"), &index, None),
            MatchOutcome::None
        );
    }

    #[test]
    fn multiple_matches_are_sorted_floored_and_truncated() {
        let index = CandidateIndex::build(vec![
            draft("far", "Brock Purdy"),
            draft("close", "Jon Smith"),
            draft("same", "John Smith"),
            draft("near", "John Smyth"),
        ]);
        let engine = MatchEngine::default();
        let found = engine.find_multiple_matches(&stats("John Smith"), index.candidates(), 5);
        let ids: Vec<_> = found.iter().map(|s| s.candidate.record.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"same"));
        assert!(!ids.contains(&"far"));
        assert!(found.windows(2).all(|w| w[0].score >= w[1].score));

        let top = engine.find_multiple_matches(&stats("John Smith"), index.candidates(), 1);
        assert_eq!(top.len(), 1);
        let suggestion = Suggestion::from(&top[0]);
        assert_eq!(suggestion.candidate_id, "same");
        assert_eq!(suggestion.confidence, ConfidenceTier::High);
    }
}
