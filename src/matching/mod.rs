//! Candidate indexing and match resolution between the two providers.

pub mod engine;
pub mod index;

pub use engine::{MatchEngine, MatchOutcome, ScoredCandidate, Suggestion};
pub use index::{Candidate, CandidateIndex};
